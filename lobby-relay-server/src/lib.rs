//! WebSocket transport for the lobby relay.
//!
//! `RelayServer` owns one `LobbyRelay` behind a mutex and exposes it on `/`.
//! Each upgraded socket gets a `ConnectionHandler` that binds the id assigned
//! at connect time and forwards the socket's frames to the relay.

mod config;
mod connection_handler;
mod error;
mod observability;
mod route;
mod server;
pub mod websocket_listener;

pub use config::{RelayConfig, DEFAULT_PORT};
pub use connection_handler::{shared_relay, ConnectionHandler, LobbyHandler, SharedRelay};
pub use error::{Result, ServerError};
pub use observability::LogConfig;
pub use route::create_relay_route;
pub use server::RelayServer;
