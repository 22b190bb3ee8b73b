//! Runs a tunnel process in front of the relay and scrapes its public URL.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

pub const DEFAULT_URL_PATTERN: &str = r"https://[a-zA-Z0-9.-]+\.trycloudflare\.com";
pub const DEFAULT_LOCAL_URL: &str = "http://localhost:8080";
pub const DEFAULT_OUTPUT_PATH: &str = "output.txt";

const MAX_TAIL: usize = 512;
const READ_BUFFER: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("Failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Tunnel exited with code {0:?}")]
    NonZeroExit(Option<i32>),

    #[error("Invalid tunnel configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone)]
pub struct TunnelConfig {
    pub command: String,
    pub args: Vec<String>,
    pub output_path: PathBuf,
    pub url_pattern: String,
    pub liveness_interval: Duration,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self::for_local_url(DEFAULT_LOCAL_URL)
    }
}

impl TunnelConfig {
    /// `cloudflared tunnel --url <local_url>`
    pub fn for_local_url(local_url: impl Into<String>) -> Self {
        Self {
            command: "cloudflared".to_string(),
            args: vec!["tunnel".to_string(), "--url".to_string(), local_url.into()],
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            url_pattern: DEFAULT_URL_PATTERN.to_string(),
            liveness_interval: Duration::from_secs(5),
        }
    }

    pub fn with_command<I, A>(mut self, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.command = command.into();
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_path(mut self, path: impl AsRef<Path>) -> Self {
        self.output_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_pattern = pattern.into();
        self
    }

    pub fn with_liveness_interval(mut self, interval: Duration) -> Self {
        self.liveness_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), TunnelError> {
        if self.command.trim().is_empty() {
            return Err(TunnelError::InvalidConfig("command must not be empty".into()));
        }
        if self.liveness_interval.is_zero() {
            return Err(TunnelError::InvalidConfig(
                "liveness interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Incremental URL matcher over process output.
///
/// Only the last `MAX_TAIL` bytes are kept between chunks, enough for a URL
/// split across reads.
#[derive(Debug)]
pub struct UrlScraper {
    pattern: Regex,
    tail: String,
    found: Option<String>,
}

impl UrlScraper {
    pub fn new(pattern: &str) -> Result<Self, TunnelError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            tail: String::new(),
            found: None,
        })
    }

    /// Feed a chunk; returns the URL the first time it appears
    pub fn push(&mut self, chunk: &str) -> Option<&str> {
        if self.found.is_some() {
            return None;
        }

        self.tail.push_str(chunk);
        if let Some(found) = self.pattern.find(&self.tail) {
            self.found = Some(found.as_str().to_owned());
            self.tail.clear();
            return self.found.as_deref();
        }

        if self.tail.len() > MAX_TAIL {
            let mut cut = self.tail.len() - MAX_TAIL;
            while !self.tail.is_char_boundary(cut) {
                cut += 1;
            }
            self.tail.drain(..cut);
        }
        None
    }

    pub fn found(&self) -> Option<&str> {
        self.found.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelOutcome {
    pub url: Option<String>,
    pub exit_code: Option<i32>,
}

pub struct TunnelRunner {
    config: TunnelConfig,
}

impl TunnelRunner {
    pub fn new(config: TunnelConfig) -> Self {
        Self { config }
    }

    /// Run the tunnel process to completion.
    ///
    /// The first URL seen on stdout or stderr is written to the output file.
    /// A non-zero exit is an error even if a URL was found.
    pub async fn run(&self) -> Result<TunnelOutcome, TunnelError> {
        self.config.validate()?;
        let mut scraper = UrlScraper::new(&self.config.url_pattern)?;

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                command: self.config.command.clone(),
                source,
            })?;
        info!(
            "Started {} {}",
            self.config.command,
            self.config.args.join(" ")
        );

        let (output_tx, mut output_rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, output_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, output_tx.clone()));
        }
        drop(output_tx);

        let mut liveness = tokio::time::interval(self.config.liveness_interval);
        liveness.tick().await;

        let status = loop {
            tokio::select! {
                Some(chunk) = output_rx.recv() => self.scan(&mut scraper, &chunk).await?,
                status = child.wait() => break status?,
                _ = liveness.tick() => info!("Tunnel is still running..."),
            }
        };

        // Output may still be buffered after the process exits
        while let Some(chunk) = output_rx.recv().await {
            self.scan(&mut scraper, &chunk).await?;
        }

        info!("Tunnel process exited with code {:?}", status.code());
        if !status.success() {
            return Err(TunnelError::NonZeroExit(status.code()));
        }

        Ok(TunnelOutcome {
            url: scraper.found().map(str::to_owned),
            exit_code: status.code(),
        })
    }

    async fn scan(&self, scraper: &mut UrlScraper, chunk: &str) -> Result<(), TunnelError> {
        debug!(target: "lobby_relay_cli::tunnel::output", "{}", chunk.trim_end());
        if let Some(url) = scraper.push(chunk) {
            info!("Found URL: {}", url);
            tokio::fs::write(&self.config.output_path, url).await?;
        }
        Ok(())
    }
}

async fn forward_output<R>(mut reader: R, output: UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; READ_BUFFER];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buffer[..n]).into_owned();
                if output.send(chunk).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to read tunnel output: {}", e);
                break;
            }
        }
    }
}
