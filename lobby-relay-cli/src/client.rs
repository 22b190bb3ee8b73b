use crate::error::{CliError, Result};
use futures_util::{SinkExt, StreamExt};
use lobby_relay_core::{ClientMessage, PlayerId, PlayerStatus, ServerMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// WebSocket client for the lobby relay.
///
/// Received text frames are queued as they arrive, so callers can poll with
/// `try_receive` or await `receive`. Sends are queued to a writer task and
/// never block.
pub struct RelayClient {
    outgoing: UnboundedSender<Message>,
    incoming: UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
    player_id: Option<PlayerId>,
    writer: Option<JoinHandle<()>>,
    reader: JoinHandle<()>,
}

impl RelayClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _response) = connect_async(url).await?;
        info!("Connected to relay at {}", url);

        let (mut ws_sender, mut ws_receiver) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (incoming_tx, incoming) = mpsc::unbounded_channel::<String>();
        let connected = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = message.is_close();
                if let Err(e) = ws_sender.send(message).await {
                    debug!("Failed to send message: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader_connected = connected.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = ws_receiver.next().await {
                match message {
                    Ok(message) if message.is_text() => {
                        if let Ok(text) = message.to_text() {
                            if incoming_tx.send(text.to_owned()).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(message) if message.is_close() => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Failed to receive message: {}", e);
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
        });

        Ok(Self {
            outgoing,
            incoming,
            connected,
            player_id: None,
            writer: Some(writer),
            reader,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Id assigned by the relay, once `wait_for_id` has seen it
    pub fn player_id(&self) -> Option<&PlayerId> {
        self.player_id.as_ref()
    }

    // ===== Sending =====

    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        if !self.is_connected() {
            return Err(CliError::ConnectionClosed);
        }
        self.outgoing
            .send(Message::text(text.into()))
            .map_err(|_| CliError::ConnectionClosed)
    }

    pub fn send(&self, message: &ClientMessage) -> Result<()> {
        self.send_text(message.to_json()?)
    }

    /// Report a status for this client's own id
    pub fn update_status(&self, status: impl Into<PlayerStatus>) -> Result<()> {
        let player_id = self.player_id.clone().ok_or(CliError::NotJoined)?;
        self.send(&ClientMessage::UpdateStatus {
            player_id,
            status: status.into(),
        })
    }

    pub fn all_ready_check(&self) -> Result<()> {
        self.send(&ClientMessage::AllReadyCheck)
    }

    // ===== Receiving =====

    /// Next queued text frame, if any, without waiting
    pub fn try_receive(&mut self) -> Option<String> {
        self.incoming.try_recv().ok()
    }

    /// Wait for the next text frame; `None` once the connection is gone and
    /// the queue is drained
    pub async fn receive(&mut self) -> Option<String> {
        self.incoming.recv().await
    }

    pub async fn receive_timeout(&mut self, timeout: Duration) -> Result<String> {
        tokio::time::timeout(timeout, self.receive())
            .await
            .map_err(|_| CliError::Timeout(timeout))?
            .ok_or(CliError::ConnectionClosed)
    }

    /// Wait for the next frame that decodes as a relay message. Frames that
    /// do not decode are logged and skipped.
    pub async fn next_message(&mut self) -> Option<ServerMessage> {
        while let Some(text) = self.receive().await {
            match serde_json::from_str::<ServerMessage>(&text) {
                Ok(message) => return Some(message),
                Err(e) => warn!("Skipping unrecognized relay message {:?}: {}", text, e),
            }
        }
        None
    }

    /// Wait for `set_unique_id` and remember the assigned id
    pub async fn wait_for_id(&mut self, timeout: Duration) -> Result<PlayerId> {
        if let Some(player_id) = &self.player_id {
            return Ok(player_id.clone());
        }

        let wait = async {
            while let Some(message) = self.next_message().await {
                if let ServerMessage::SetUniqueId { id } = message {
                    return Ok(id);
                }
                debug!(action = message.action(), "Message before id assignment");
            }
            Err(CliError::ConnectionClosed)
        };

        let player_id = tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| CliError::Timeout(timeout))??;
        self.player_id = Some(player_id.clone());
        Ok(player_id)
    }

    // ===== Shutdown =====

    /// Send a close frame and wait briefly for it to go out
    pub async fn disconnect(&mut self) {
        let _ = self.outgoing.send(Message::Close(None));
        if let Some(writer) = self.writer.take() {
            if tokio::time::timeout(CLOSE_GRACE, writer).await.is_err() {
                debug!("Writer did not finish within {:?}", CLOSE_GRACE);
            }
        }
        self.reader.abort();
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        self.reader.abort();
    }
}
