use crate::config::RelayConfig;
use crate::connection_handler::{shared_relay, SharedRelay};
use crate::error::{Result, ServerError};
use crate::route::create_relay_route;
use axum::Router;
use lobby_relay_core::LobbyRelay;
use std::future::{Future, IntoFuture};
use tokio::net::TcpListener;
use tracing::info;

/// Owns the relay and serves it over WebSocket
pub struct RelayServer {
    config: RelayConfig,
    relay: SharedRelay,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        let relay = shared_relay(LobbyRelay::new(config.policy()));
        Self { config, relay }
    }

    /// Handle to the relay, e.g. for inspecting the lobby from tests
    pub fn relay(&self) -> SharedRelay {
        self.relay.clone()
    }

    pub fn router(&self) -> Router {
        create_relay_route(self.relay.clone())
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.socket_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serve on an already bound listener until the listener fails
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.serve_until(listener, std::future::pending::<()>()).await
    }

    /// Serve until `shutdown` resolves. Sockets already upgraded are not waited for.
    pub async fn serve_until<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = listener.local_addr()?;
        info!("WebSocket relay is running at ws://{}", local_addr);

        let router = self.router();
        tokio::select! {
            result = axum::serve(listener, router).into_future() => result?,
            _ = shutdown => info!("Shutting down relay"),
        }
        Ok(())
    }

    /// Bind the configured address and serve until Ctrl+C
    pub async fn run(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve_until(listener, async {
            // Without a signal handler the relay runs until killed
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}
