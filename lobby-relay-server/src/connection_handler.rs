use async_trait::async_trait;
use lobby_relay_core::{LobbyRelay, PlayerId, RelayEvent};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// The relay shared by every socket; all handlers run under this lock one at
/// a time.
pub type SharedRelay = Arc<Mutex<LobbyRelay<UnboundedSender<String>>>>;

pub fn shared_relay(relay: LobbyRelay<UnboundedSender<String>>) -> SharedRelay {
    Arc::new(Mutex::new(relay))
}

/// Callbacks invoked by the listener for the three socket events
#[async_trait]
pub trait LobbyHandler: Send + Sync {
    /// Register the socket's outbound queue and bind its identity
    async fn on_connect(&self, sender: UnboundedSender<String>) -> PlayerId;

    async fn on_message(&self, text: &str);

    async fn on_disconnect(&self);
}

/// Per-socket handler. The id assigned at connect time is stored here, so
/// disconnect finds its connection without any outside bookkeeping.
#[derive(Clone)]
pub struct ConnectionHandler {
    player_id: Arc<OnceLock<PlayerId>>,
    relay: SharedRelay,
}

impl ConnectionHandler {
    pub fn new(relay: SharedRelay) -> Self {
        ConnectionHandler {
            player_id: Arc::new(OnceLock::new()),
            relay,
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id.get().cloned()
    }

    pub fn relay(&self) -> &SharedRelay {
        &self.relay
    }
}

#[async_trait]
impl LobbyHandler for ConnectionHandler {
    #[instrument(skip(self, sender))]
    async fn on_connect(&self, sender: UnboundedSender<String>) -> PlayerId {
        // Every connect goes through the relay lock, so check and bind are
        // one step for all handlers sharing this identity
        let mut relay = self.relay.lock().await;
        if let Some(existing) = self.player_id.get() {
            warn!(player_id = %existing, "Socket already joined the lobby");
            return existing.clone();
        }

        let player_id = relay.on_connect(sender);
        match self.player_id.set(player_id.clone()) {
            Ok(()) => player_id,
            Err(rejected) => {
                warn!(player_id = %rejected, "Identity bound concurrently, dropping duplicate entry");
                relay.on_disconnect(&rejected);
                self.player_id.get().cloned().unwrap_or(rejected)
            }
        }
    }

    #[instrument(skip(self, text), fields(player_id = ?self.player_id.get()))]
    async fn on_message(&self, text: &str) {
        let Some(player_id) = self.player_id.get() else {
            warn!("Message from a socket that never joined, dropping");
            return;
        };

        // Malformed input is logged by the relay and never answered
        if let Ok(events) = self.relay.lock().await.on_message(player_id, text) {
            for event in events {
                match event {
                    RelayEvent::Ignored(reason) => debug!(?reason, "Message ignored"),
                    event => debug!(?event, "Message applied"),
                }
            }
        }
    }

    #[instrument(skip(self), fields(player_id = ?self.player_id.get()))]
    async fn on_disconnect(&self) {
        if let Some(player_id) = self.player_id.get() {
            if self.relay.lock().await.on_disconnect(player_id).is_none() {
                debug!("Connection was already removed");
            }
        }
    }
}
