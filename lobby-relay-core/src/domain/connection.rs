use crate::domain::{IdGenerator, PlayerId, PlayerSnapshot, PlayerStatus};
use crate::sink::MessageSink;
use std::collections::HashMap;
use tracing::debug;

/// One tracked client session
#[derive(Debug)]
pub struct Connection<S> {
    id: PlayerId,
    status: PlayerStatus,
    sink: S,
}

impl<S: MessageSink> Connection<S> {
    pub fn new(id: PlayerId, sink: S) -> Self {
        Connection {
            id,
            status: PlayerStatus::Connected,
            sink,
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            player_id: self.id.clone(),
            status: self.status.clone(),
        }
    }
}

/// Outcome of applying a status to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// No connection holds this id
    UnknownPlayer,
    /// The stored status already equals the new one
    Unchanged,
    Changed { previous: PlayerStatus },
}

/// Per-recipient tally of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Recipients whose stream was no longer open
    pub skipped: usize,
    /// Recipients whose stream rejected the message
    pub failed: usize,
}

/// Mapping from player id to connection; the single source of truth for
/// who is in the lobby.
#[derive(Debug)]
pub struct ConnectionRegistry<S> {
    connections: HashMap<PlayerId, Connection<S>>,
}

impl<S> Default for ConnectionRegistry<S> {
    fn default() -> Self {
        ConnectionRegistry {
            connections: HashMap::new(),
        }
    }
}

impl<S: MessageSink> ConnectionRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Queries =====

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Connection<S>> {
        self.connections.get(id)
    }

    /// Non-empty and every tracked status is `ready`
    pub fn all_ready(&self) -> bool {
        !self.connections.is_empty()
            && self
                .connections
                .values()
                .all(|connection| connection.status.is_ready())
    }

    /// Snapshot of all entries, ordered by id
    pub fn snapshot(&self) -> Vec<PlayerSnapshot> {
        let mut players: Vec<_> = self.connections.values().map(Connection::snapshot).collect();
        players.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        players
    }

    // ===== Mutations =====

    /// Draw ids until one is not a live key, then insert the connection
    pub fn admit(&mut self, ids: &mut dyn IdGenerator, sink: S) -> PlayerId {
        let id = loop {
            let candidate = ids.next_id();
            if !self.connections.contains_key(&candidate) {
                break candidate;
            }
            debug!(%candidate, "Generated id collides with a live connection, drawing again");
        };

        self.connections
            .insert(id.clone(), Connection::new(id.clone(), sink));
        id
    }

    pub fn set_status(&mut self, id: &PlayerId, status: PlayerStatus) -> StatusChange {
        match self.connections.get_mut(id) {
            None => StatusChange::UnknownPlayer,
            Some(connection) if connection.status == status => StatusChange::Unchanged,
            Some(connection) => {
                let previous = std::mem::replace(&mut connection.status, status);
                StatusChange::Changed { previous }
            }
        }
    }

    pub fn remove(&mut self, id: &PlayerId) -> Option<Connection<S>> {
        self.connections.remove(id)
    }

    // ===== Delivery =====

    /// Deliver `text` to a single connection
    pub fn send_to(&self, id: &PlayerId, text: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        if let Some(connection) = self.connections.get(id) {
            deliver(connection, text, &mut report);
        }
        report
    }

    /// Deliver `text` to every open connection except `exclude`
    pub fn broadcast(&self, text: &str, exclude: Option<&PlayerId>) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for connection in self.connections.values() {
            if exclude == Some(&connection.id) {
                continue;
            }
            deliver(connection, text, &mut report);
        }
        report
    }
}

fn deliver<S: MessageSink>(connection: &Connection<S>, text: &str, report: &mut BroadcastReport) {
    if !connection.sink.is_open() {
        report.skipped += 1;
        return;
    }
    match connection.sink.deliver(text) {
        Ok(()) => report.delivered += 1,
        Err(e) => {
            debug!(player_id = %connection.id, error = %e, "Failed to deliver message");
            report.failed += 1;
        }
    }
}
