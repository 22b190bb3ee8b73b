pub mod client;
pub mod error;
pub mod tunnel;

pub use client::RelayClient;
pub use error::{CliError, Result};
pub use tunnel::{TunnelConfig, TunnelError, TunnelOutcome, TunnelRunner, UrlScraper};
