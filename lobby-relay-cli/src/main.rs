use clap::{Parser, Subcommand};
use lobby_relay_cli::tunnel::{DEFAULT_LOCAL_URL, DEFAULT_OUTPUT_PATH, DEFAULT_URL_PATTERN};
use lobby_relay_cli::{RelayClient, Result, TunnelConfig, TunnelRunner};
use lobby_relay_core::ServerMessage;
use lobby_relay_server::LogConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lobby-cli")]
#[command(version, about = "Lobby relay CLI - join a relay or expose it through a tunnel")]
struct Cli {
    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a relay and log lobby events until Ctrl+C
    Join {
        /// Relay WebSocket URL
        #[arg(short = 'u', long, default_value = "ws://localhost:8080/")]
        url: String,

        /// Status to report once an id is assigned
        #[arg(short = 's', long)]
        status: Option<String>,

        /// Ask the relay whether everyone is ready
        #[arg(long)]
        check: bool,

        /// Seconds to wait for the relay to assign an id
        #[arg(long, default_value_t = 5)]
        join_timeout: u64,
    },

    /// Run a tunnel process and record its public URL
    Tunnel {
        /// Tunnel executable
        #[arg(long, default_value = "cloudflared")]
        command: String,

        /// Local address the tunnel forwards to
        #[arg(long, default_value = DEFAULT_LOCAL_URL)]
        local_url: String,

        /// File the public URL is written to
        #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_PATH)]
        output: PathBuf,

        /// Regex matching the public URL in the tunnel's output
        #[arg(long, default_value = DEFAULT_URL_PATTERN)]
        pattern: String,

        /// Seconds between liveness log lines
        #[arg(long, default_value_t = 5)]
        liveness_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    LogConfig::default().with_level(cli.log_level).init()?;

    match cli.command {
        Commands::Join {
            url,
            status,
            check,
            join_timeout,
        } => join(&url, status, check, Duration::from_secs(join_timeout)).await?,
        Commands::Tunnel {
            command,
            local_url,
            output,
            pattern,
            liveness_secs,
        } => {
            let mut config = TunnelConfig::for_local_url(local_url)
                .with_output_path(output)
                .with_url_pattern(pattern)
                .with_liveness_interval(Duration::from_secs(liveness_secs));
            config.command = command;
            let outcome = TunnelRunner::new(config).run().await?;
            match outcome.url {
                Some(url) => info!("Tunnel finished; public URL was {}", url),
                None => warn!("Tunnel finished without printing a public URL"),
            }
        }
    }

    Ok(())
}

async fn join(url: &str, status: Option<String>, check: bool, timeout: Duration) -> Result<()> {
    let mut client = RelayClient::connect(url).await?;
    let player_id = client.wait_for_id(timeout).await?;
    info!("Joined lobby as {}", player_id);

    if let Some(status) = status {
        client.update_status(status)?;
    }
    if check {
        client.all_ready_check()?;
    }

    info!("Press Ctrl+C to leave");
    loop {
        tokio::select! {
            message = client.next_message() => match message {
                Some(message) => log_event(&message),
                None => {
                    warn!("Relay closed the connection");
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await;
    info!("Left lobby");
    Ok(())
}

fn log_event(message: &ServerMessage) {
    match message {
        ServerMessage::SetUniqueId { id } => info!("Assigned id {}", id),
        ServerMessage::PlayerConnected { player_id, status } => {
            info!("{} joined ({})", player_id, status)
        }
        ServerMessage::StatusUpdated { player_id, status } => {
            info!("{} is now {}", player_id, status)
        }
        ServerMessage::PlayerLeft { player_id } => info!("{} left the lobby", player_id),
        ServerMessage::AllReady => info!("All players are ready"),
        ServerMessage::PlayerDisconnected { player_id } => info!("{} disconnected", player_id),
    }
}
