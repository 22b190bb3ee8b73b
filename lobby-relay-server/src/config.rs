use lobby_relay_core::{IdScheme, RelayPolicy};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_PORT: u16 = 8080;

/// Configuration for a relay server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Interface to listen on
    pub host: IpAddr,

    /// Listen port; 0 picks a free port
    pub port: u16,

    /// How player ids are generated
    pub id_scheme: IdScheme,

    /// Reject `update_status` messages that target another player's id
    pub enforce_status_ownership: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            id_scheme: IdScheme::default(),
            enforce_status_ownership: false,
        }
    }
}

impl RelayConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Loopback-only config on an ephemeral port
    pub fn local() -> Self {
        Self::new(0).with_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_id_scheme(mut self, id_scheme: IdScheme) -> Self {
        self.id_scheme = id_scheme;
        self
    }

    pub fn with_status_ownership(mut self, enforce: bool) -> Self {
        self.enforce_status_ownership = enforce;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn policy(&self) -> RelayPolicy {
        RelayPolicy {
            id_scheme: self.id_scheme,
            enforce_status_ownership: self.enforce_status_ownership,
        }
    }
}
