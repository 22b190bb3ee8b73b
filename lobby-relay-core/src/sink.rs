use crate::protocol::ServerMessage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

/// Delivery to a single recipient failed
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Recipient stream is closed")]
    Closed,
}

/// Outbound half of a connection's stream handle.
///
/// `deliver` must not block: the relay calls it while holding the lobby lock.
pub trait MessageSink: Send {
    /// Whether the stream can still accept messages. Closed sinks are
    /// skipped during broadcasts without counting as failures.
    fn is_open(&self) -> bool;

    fn deliver(&self, text: &str) -> Result<(), DeliveryError>;
}

/// The server queues outgoing text per socket; a writer task drains it.
impl MessageSink for UnboundedSender<String> {
    fn is_open(&self) -> bool {
        !self.is_closed()
    }

    fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        self.send(text.to_string()).map_err(|_| DeliveryError::Closed)
    }
}

#[derive(Debug, Default)]
struct MemorySinkState {
    messages: Vec<String>,
    closed: bool,
    failing: bool,
}

/// In-memory sink that records every delivered message.
///
/// Clones share the same buffer, so a test can hand one clone to the relay
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemorySinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that reports itself open but rejects every delivery
    pub fn failing() -> Self {
        let sink = Self::new();
        sink.lock().failing = true;
        sink
    }

    /// Mark the stream closed; later broadcasts skip it
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// Raw text of every message received so far
    pub fn messages(&self) -> Vec<String> {
        self.lock().messages.clone()
    }

    /// Drain the recorded messages
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().messages)
    }

    /// Drain and decode the recorded messages, dropping anything that is not
    /// a server message
    pub fn take_decoded(&self) -> Vec<ServerMessage> {
        self.take()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemorySinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageSink for MemorySink {
    fn is_open(&self) -> bool {
        !self.lock().closed
    }

    fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        let mut state = self.lock();
        if state.closed || state.failing {
            return Err(DeliveryError::Closed);
        }
        state.messages.push(text.to_string());
        Ok(())
    }
}
