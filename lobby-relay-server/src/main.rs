use clap::Parser;
use lobby_relay_core::IdScheme;
use lobby_relay_server::{LogConfig, RelayConfig, RelayServer, Result, DEFAULT_PORT};
use std::net::IpAddr;

#[derive(Parser)]
#[command(name = "lobby-relay")]
#[command(
    version,
    about = "Lobby relay - tracks player readiness and broadcasts status changes over WebSocket"
)]
struct Cli {
    /// Interface to listen on
    #[arg(long, env = "LOBBY_RELAY_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short = 'p', long, env = "LOBBY_RELAY_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Player id scheme: sequential or random
    #[arg(long, env = "LOBBY_RELAY_ID_SCHEME", default_value = "sequential")]
    id_scheme: IdScheme,

    /// Only let a client update its own status
    #[arg(long, env = "LOBBY_RELAY_ENFORCE_OWNERSHIP")]
    enforce_ownership: bool,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    LogConfig::default()
        .with_level(cli.log_level)
        .with_json(cli.json_logs)
        .init()?;

    let config = RelayConfig::new(cli.port)
        .with_host(cli.host)
        .with_id_scheme(cli.id_scheme)
        .with_status_ownership(cli.enforce_ownership);

    RelayServer::new(config).run().await
}
