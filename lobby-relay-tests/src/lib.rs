use cucumber::World;
use lobby_relay_core::{
    ClientMessage, LobbyRelay, MemorySink, PlayerId, PlayerStatus, RelayEvent, ServerMessage,
};
use std::collections::{HashMap, VecDeque};

/// A player as seen by the scenarios: the assigned id plus the sink the relay
/// writes to
#[derive(Debug)]
pub struct TestPlayer {
    pub id: PlayerId,
    pub sink: MemorySink,
    /// Decoded messages not yet asserted on
    pub inbox: VecDeque<ServerMessage>,
}

#[derive(Debug, World, Default)]
pub struct LobbyWorld {
    /// The relay under test, driven directly without a socket
    pub relay: LobbyRelay<MemorySink>,

    /// Players by scenario name
    pub players: HashMap<String, TestPlayer>,

    /// Ids of everyone who ever connected, in order
    pub assigned_ids: Vec<PlayerId>,

    /// Events from the last handled message
    pub last_events: Vec<RelayEvent>,

    /// Decode error from the last handled message
    pub last_error: Option<String>,
}

impl LobbyWorld {
    /// Open a new stream for `name`
    pub fn connect(&mut self, name: &str) -> PlayerId {
        let sink = MemorySink::new();
        let id = self.relay.on_connect(sink.clone());
        self.assigned_ids.push(id.clone());
        self.players.insert(
            name.to_string(),
            TestPlayer {
                id: id.clone(),
                sink,
                inbox: VecDeque::new(),
            },
        );
        id
    }

    pub fn id_of(&self, name: &str) -> PlayerId {
        self.player(name).id.clone()
    }

    pub fn player(&self, name: &str) -> &TestPlayer {
        self.players
            .get(name)
            .unwrap_or_else(|| panic!("Player '{}' not found", name))
    }

    /// Feed a raw text frame from `name` to the relay
    pub fn send_raw(&mut self, name: &str, raw: &str) {
        let origin = self.id_of(name);
        match self.relay.on_message(&origin, raw) {
            Ok(events) => {
                self.last_events = events;
                self.last_error = None;
            }
            Err(e) => {
                self.last_events.clear();
                self.last_error = Some(e.to_string());
            }
        }
    }

    pub fn send(&mut self, name: &str, message: &ClientMessage) {
        let raw = message.to_json().expect("Failed to encode client message");
        self.send_raw(name, &raw);
    }

    pub fn update_status(&mut self, name: &str, target: &str, status: &str) {
        let message = ClientMessage::UpdateStatus {
            player_id: self.id_of(target),
            status: PlayerStatus::from(status),
        };
        self.send(name, &message);
    }

    pub fn disconnect(&mut self, name: &str) -> Option<RelayEvent> {
        let origin = self.id_of(name);
        self.player(name).sink.close();
        self.relay.on_disconnect(&origin)
    }

    /// Move everything delivered so far into each player's inbox
    fn collect(&mut self) {
        for player in self.players.values_mut() {
            player.inbox.extend(player.sink.take_decoded());
        }
    }

    /// Next unasserted message for `name`
    pub fn next_message(&mut self, name: &str) -> Option<ServerMessage> {
        self.collect();
        self.players.get_mut(name)?.inbox.pop_front()
    }

    /// Drop every message delivered so far
    pub fn clear_inboxes(&mut self) {
        self.collect();
        for player in self.players.values_mut() {
            player.inbox.clear();
        }
    }
}
