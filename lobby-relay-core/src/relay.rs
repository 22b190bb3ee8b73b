use crate::domain::{
    BroadcastReport, ConnectionRegistry, IdGenerator, IdScheme, PlayerId, PlayerSnapshot,
    PlayerStatus, StatusChange,
};
use crate::protocol::{self, ClientMessage, Inbound, ProtocolError, ServerMessage};
use crate::sink::MessageSink;
use tracing::{debug, error, info, instrument, warn};

/// Tunables for a relay instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayPolicy {
    pub id_scheme: IdScheme,
    /// Only accept `update_status` for the sender's own id
    pub enforce_status_ownership: bool,
}

/// What a handler did, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    StatusUpdated {
        player_id: PlayerId,
        previous: PlayerStatus,
        status: PlayerStatus,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    AllReady {
        recipients: usize,
    },
    PlayerDisconnected {
        player_id: PlayerId,
    },
    Ignored(IgnoredReason),
}

/// Why a well-formed message produced no state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoredReason {
    UnknownAction(Option<String>),
    MissingField(&'static str),
    UnknownPlayer(PlayerId),
    StatusUnchanged(PlayerId),
    NotOwner { sender: PlayerId, target: PlayerId },
}

/// Lobby state plus the rules for connect, message and disconnect events.
///
/// The relay is synchronous and owns its registry; callers serialize access
/// (the server keeps it behind a mutex) and hand it the sink of each new
/// stream.
#[derive(Debug)]
pub struct LobbyRelay<S> {
    registry: ConnectionRegistry<S>,
    ids: Box<dyn IdGenerator>,
    policy: RelayPolicy,
}

impl<S: MessageSink> Default for LobbyRelay<S> {
    fn default() -> Self {
        Self::new(RelayPolicy::default())
    }
}

impl<S: MessageSink> LobbyRelay<S> {
    pub fn new(policy: RelayPolicy) -> Self {
        Self::with_generator(policy, policy.id_scheme.generator())
    }

    pub fn with_generator(policy: RelayPolicy, ids: Box<dyn IdGenerator>) -> Self {
        LobbyRelay {
            registry: ConnectionRegistry::new(),
            ids,
            policy,
        }
    }

    // ===== Queries =====

    pub fn policy(&self) -> RelayPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.registry.contains(id)
    }

    pub fn status_of(&self, id: &PlayerId) -> Option<&PlayerStatus> {
        self.registry.get(id).map(|connection| connection.status())
    }

    pub fn snapshot(&self) -> Vec<PlayerSnapshot> {
        self.registry.snapshot()
    }

    // ===== Event handlers =====

    /// Admit a new stream: assign an id, tell the stream its id, announce it
    /// to everyone else.
    #[instrument(skip(self, sink))]
    pub fn on_connect(&mut self, sink: S) -> PlayerId {
        let player_id = self.registry.admit(self.ids.as_mut(), sink);
        info!(%player_id, players = self.registry.len(), "Player connected");

        if let Some(text) = encode(&ServerMessage::SetUniqueId {
            id: player_id.clone(),
        }) {
            self.registry.send_to(&player_id, &text);
        }

        self.broadcast(
            &ServerMessage::PlayerConnected {
                player_id: player_id.clone(),
                status: PlayerStatus::Connected,
            },
            Some(&player_id),
        );

        player_id
    }

    /// Decode and apply one text frame from `origin`.
    ///
    /// Returns `Err` only for malformed text, which callers drop. Every other
    /// input yields the events it caused, `Ignored` included.
    #[instrument(skip(self, origin, raw), fields(origin = %origin))]
    pub fn on_message(
        &mut self,
        origin: &PlayerId,
        raw: &str,
    ) -> Result<Vec<RelayEvent>, ProtocolError> {
        match protocol::decode(raw) {
            Ok(Inbound::Command(command)) => Ok(self.handle(origin, command)),
            Ok(Inbound::UnknownAction(action)) => {
                debug!(?action, "Unknown action");
                Ok(vec![RelayEvent::Ignored(IgnoredReason::UnknownAction(action))])
            }
            Err(ProtocolError::MissingField(field)) => {
                debug!(field, "update_status without required field");
                Ok(vec![RelayEvent::Ignored(IgnoredReason::MissingField(field))])
            }
            Err(e) => {
                warn!(error = %e, raw, "Dropping malformed message");
                Err(e)
            }
        }
    }

    /// Apply an already decoded command from `origin`
    pub fn handle(&mut self, origin: &PlayerId, command: ClientMessage) -> Vec<RelayEvent> {
        match command {
            ClientMessage::UpdateStatus { player_id, status } => {
                self.update_status(origin, player_id, status)
            }
            ClientMessage::AllReadyCheck => self.check_all_ready().into_iter().collect(),
        }
    }

    /// Drop `origin` from the lobby and tell the remaining streams.
    ///
    /// Returns `None` when the id is no longer tracked, so a duplicate close
    /// never produces a second broadcast.
    #[instrument(skip(self, origin), fields(origin = %origin))]
    pub fn on_disconnect(&mut self, origin: &PlayerId) -> Option<RelayEvent> {
        // Dropping the connection releases its stream handle
        self.registry.remove(origin)?;
        info!(players = self.registry.len(), "Player disconnected");

        self.broadcast(
            &ServerMessage::PlayerDisconnected {
                player_id: origin.clone(),
            },
            Some(origin),
        );

        Some(RelayEvent::PlayerDisconnected {
            player_id: origin.clone(),
        })
    }

    /// Broadcast `all_ready` to every open stream if the lobby is non-empty
    /// and everyone is ready
    pub fn check_all_ready(&self) -> Option<RelayEvent> {
        if !self.registry.all_ready() {
            return None;
        }

        let report = self.broadcast(&ServerMessage::AllReady, None);
        info!(recipients = report.delivered, "All players ready");
        Some(RelayEvent::AllReady {
            recipients: report.delivered,
        })
    }

    // ===== Internals =====

    fn update_status(
        &mut self,
        origin: &PlayerId,
        player_id: PlayerId,
        status: PlayerStatus,
    ) -> Vec<RelayEvent> {
        if self.policy.enforce_status_ownership && &player_id != origin {
            debug!(target_player = %player_id, "Rejecting status update for another player");
            return vec![RelayEvent::Ignored(IgnoredReason::NotOwner {
                sender: origin.clone(),
                target: player_id,
            })];
        }

        let previous = match self.registry.set_status(&player_id, status.clone()) {
            StatusChange::UnknownPlayer => {
                debug!(%player_id, "Status update for unknown player");
                return vec![RelayEvent::Ignored(IgnoredReason::UnknownPlayer(player_id))];
            }
            StatusChange::Unchanged => {
                return vec![RelayEvent::Ignored(IgnoredReason::StatusUnchanged(player_id))];
            }
            StatusChange::Changed { previous } => previous,
        };

        info!(%player_id, %previous, %status, "Status updated");
        let mut events = Vec::with_capacity(3);

        self.broadcast(
            &ServerMessage::StatusUpdated {
                player_id: player_id.clone(),
                status: status.clone(),
            },
            Some(origin),
        );

        if status.is_left() {
            self.broadcast(
                &ServerMessage::PlayerLeft {
                    player_id: player_id.clone(),
                },
                Some(origin),
            );
        }

        events.push(RelayEvent::StatusUpdated {
            player_id: player_id.clone(),
            previous,
            status: status.clone(),
        });
        if status.is_left() {
            events.push(RelayEvent::PlayerLeft { player_id });
        }
        events.extend(self.check_all_ready());
        events
    }

    fn broadcast(&self, message: &ServerMessage, exclude: Option<&PlayerId>) -> BroadcastReport {
        let Some(text) = encode(message) else {
            return BroadcastReport::default();
        };
        let report = self.registry.broadcast(&text, exclude);
        debug!(
            action = message.action(),
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "Broadcast"
        );
        report
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match message.to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            error!(error = %e, action = message.action(), "Failed to serialize message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn relay() -> LobbyRelay<MemorySink> {
        LobbyRelay::default()
    }

    fn join(relay: &mut LobbyRelay<MemorySink>) -> (PlayerId, MemorySink) {
        let sink = MemorySink::new();
        let id = relay.on_connect(sink.clone());
        (id, sink)
    }

    fn update(player_id: &PlayerId, status: &str) -> String {
        ClientMessage::UpdateStatus {
            player_id: player_id.clone(),
            status: status.into(),
        }
        .to_json()
        .unwrap()
    }

    fn clear(sinks: &[&MemorySink]) {
        for sink in sinks {
            sink.take();
        }
    }

    #[test]
    fn test_connect_sends_id_then_announces() {
        let mut relay = relay();
        let (a, a_sink) = join(&mut relay);
        assert_eq!(
            a_sink.take_decoded(),
            vec![ServerMessage::SetUniqueId { id: a.clone() }]
        );

        let (b, b_sink) = join(&mut relay);
        assert_ne!(a, b);
        assert_eq!(
            b_sink.take_decoded(),
            vec![ServerMessage::SetUniqueId { id: b.clone() }]
        );
        assert_eq!(
            a_sink.take_decoded(),
            vec![ServerMessage::PlayerConnected {
                player_id: b,
                status: PlayerStatus::Connected
            }]
        );
    }

    #[test]
    fn test_status_update_is_not_echoed_to_sender() {
        let mut relay = relay();
        let (a, a_sink) = join(&mut relay);
        let (_b, b_sink) = join(&mut relay);
        clear(&[&a_sink, &b_sink]);

        let events = relay.on_message(&a, &update(&a, "choosing")).unwrap();

        assert_eq!(
            events,
            vec![RelayEvent::StatusUpdated {
                player_id: a.clone(),
                previous: PlayerStatus::Connected,
                status: PlayerStatus::Other("choosing".to_string()),
            }]
        );
        assert!(a_sink.messages().is_empty());
        assert_eq!(
            b_sink.take_decoded(),
            vec![ServerMessage::StatusUpdated {
                player_id: a,
                status: PlayerStatus::Other("choosing".to_string())
            }]
        );
    }

    #[test]
    fn test_repeated_status_is_suppressed() {
        let mut relay = relay();
        let (a, a_sink) = join(&mut relay);
        let (_b, b_sink) = join(&mut relay);

        relay.on_message(&a, &update(&a, "ready")).unwrap();
        clear(&[&a_sink, &b_sink]);

        let events = relay.on_message(&a, &update(&a, "ready")).unwrap();

        assert_eq!(
            events,
            vec![RelayEvent::Ignored(IgnoredReason::StatusUnchanged(a))]
        );
        assert!(a_sink.messages().is_empty());
        assert!(b_sink.messages().is_empty());
    }

    #[test]
    fn test_left_emits_status_then_player_left() {
        let mut relay = relay();
        let (a, _a_sink) = join(&mut relay);
        let (_b, b_sink) = join(&mut relay);
        b_sink.take();

        let events = relay.on_message(&a, &update(&a, "left")).unwrap();

        assert_eq!(
            b_sink.take_decoded(),
            vec![
                ServerMessage::StatusUpdated {
                    player_id: a.clone(),
                    status: PlayerStatus::Left
                },
                ServerMessage::PlayerLeft {
                    player_id: a.clone()
                },
            ]
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], RelayEvent::PlayerLeft { player_id: a.clone() });
        // Leaving does not remove the connection
        assert_eq!(relay.status_of(&a), Some(&PlayerStatus::Left));
    }

    #[test]
    fn test_three_players_all_ready_example() {
        let mut relay = relay();
        let (a, a_sink) = join(&mut relay);
        let (b, b_sink) = join(&mut relay);
        let (c, c_sink) = join(&mut relay);

        relay.on_message(&a, &update(&a, "ready")).unwrap();
        relay.on_message(&b, &update(&b, "ready")).unwrap();
        clear(&[&a_sink, &b_sink, &c_sink]);

        let events = relay
            .on_message(&a, &ClientMessage::AllReadyCheck.to_json().unwrap())
            .unwrap();
        assert!(events.is_empty());
        assert!(a_sink.messages().is_empty());

        let events = relay.on_message(&c, &update(&c, "ready")).unwrap();
        assert_eq!(events.last(), Some(&RelayEvent::AllReady { recipients: 3 }));

        // c gets only all_ready; a and b get the status relay plus all_ready
        assert_eq!(c_sink.take_decoded(), vec![ServerMessage::AllReady]);
        for sink in [&a_sink, &b_sink] {
            assert_eq!(
                sink.take_decoded(),
                vec![
                    ServerMessage::StatusUpdated {
                        player_id: c.clone(),
                        status: PlayerStatus::Ready
                    },
                    ServerMessage::AllReady,
                ]
            );
        }
    }

    #[test]
    fn test_all_ready_check_reaches_requester() {
        let mut relay = relay();
        let (a, a_sink) = join(&mut relay);
        relay.on_message(&a, &update(&a, "ready")).unwrap();
        a_sink.take();

        let events = relay
            .on_message(&a, r#"{"action":"all_ready_check"}"#)
            .unwrap();

        assert_eq!(events, vec![RelayEvent::AllReady { recipients: 1 }]);
        assert_eq!(a_sink.take_decoded(), vec![ServerMessage::AllReady]);
    }

    #[test]
    fn test_all_ready_check_ignores_extra_fields_of_any_type() {
        let mut relay = relay();
        let (a, a_sink) = join(&mut relay);
        relay.on_message(&a, &update(&a, "ready")).unwrap();
        a_sink.take();

        for raw in [
            r#"{"action":"all_ready_check","playerId":42}"#,
            r#"{"action":"all_ready_check","status":true}"#,
            r#"{"action":"update_status","action":"all_ready_check"}"#,
        ] {
            let events = relay.on_message(&a, raw).unwrap();
            assert_eq!(events, vec![RelayEvent::AllReady { recipients: 1 }], "{raw}");
            assert_eq!(a_sink.take_decoded(), vec![ServerMessage::AllReady]);
        }
    }

    #[test]
    fn test_update_status_with_non_text_fields_is_ignored() {
        let mut relay = relay();
        let (a, a_sink) = join(&mut relay);
        let (_b, b_sink) = join(&mut relay);
        clear(&[&a_sink, &b_sink]);

        let raw = format!(r#"{{"action":"update_status","playerId":"{a}","status":true}}"#);
        assert_eq!(
            relay.on_message(&a, &raw).unwrap(),
            vec![RelayEvent::Ignored(IgnoredReason::MissingField("status"))]
        );
        assert_eq!(
            relay
                .on_message(&a, r#"{"action":"update_status","playerId":42,"status":"ready"}"#)
                .unwrap(),
            vec![RelayEvent::Ignored(IgnoredReason::MissingField("playerId"))]
        );
        assert_eq!(relay.status_of(&a), Some(&PlayerStatus::Connected));
        assert!(b_sink.messages().is_empty());
    }

    #[test]
    fn test_empty_lobby_is_never_all_ready() {
        let relay: LobbyRelay<MemorySink> = relay();
        assert_eq!(relay.check_all_ready(), None);
    }

    #[test]
    fn test_new_player_suppresses_all_ready() {
        let mut relay = relay();
        let (a, _) = join(&mut relay);
        relay.on_message(&a, &update(&a, "ready")).unwrap();
        assert!(relay.check_all_ready().is_some());

        let (b, _) = join(&mut relay);
        assert!(relay.check_all_ready().is_none());

        let events = relay.on_message(&b, &update(&b, "ready")).unwrap();
        assert!(matches!(events.last(), Some(RelayEvent::AllReady { .. })));
    }

    #[test]
    fn test_unknown_player_and_action_are_ignored() {
        let mut relay = relay();
        let (a, a_sink) = join(&mut relay);
        let (_b, b_sink) = join(&mut relay);
        clear(&[&a_sink, &b_sink]);

        let ghost = PlayerId::new("player-ghost");
        assert_eq!(
            relay.on_message(&a, &update(&ghost, "ready")).unwrap(),
            vec![RelayEvent::Ignored(IgnoredReason::UnknownPlayer(ghost))]
        );
        assert_eq!(
            relay.on_message(&a, r#"{"action":"jump"}"#).unwrap(),
            vec![RelayEvent::Ignored(IgnoredReason::UnknownAction(Some(
                "jump".to_string()
            )))]
        );
        assert_eq!(
            relay
                .on_message(&a, r#"{"action":"update_status","status":"ready"}"#)
                .unwrap(),
            vec![RelayEvent::Ignored(IgnoredReason::MissingField("playerId"))]
        );
        assert!(a_sink.messages().is_empty());
        assert!(b_sink.messages().is_empty());
    }

    #[test]
    fn test_malformed_message_is_rejected_without_side_effects() {
        let mut relay = relay();
        let (a, a_sink) = join(&mut relay);
        let (_b, b_sink) = join(&mut relay);
        clear(&[&a_sink, &b_sink]);

        assert!(relay.on_message(&a, "{not json").is_err());
        assert!(a_sink.messages().is_empty());
        assert!(b_sink.messages().is_empty());
    }

    #[test]
    fn test_any_client_may_update_known_player_by_default() {
        let mut relay = relay();
        let (a, _) = join(&mut relay);
        let (b, _) = join(&mut relay);

        relay.on_message(&a, &update(&b, "ready")).unwrap();
        assert_eq!(relay.status_of(&b), Some(&PlayerStatus::Ready));
    }

    #[test]
    fn test_ownership_policy_rejects_foreign_updates() {
        let mut relay: LobbyRelay<MemorySink> = LobbyRelay::new(RelayPolicy {
            enforce_status_ownership: true,
            ..RelayPolicy::default()
        });
        let (a, _) = join(&mut relay);
        let (b, _) = join(&mut relay);

        let events = relay.on_message(&a, &update(&b, "ready")).unwrap();
        assert_eq!(
            events,
            vec![RelayEvent::Ignored(IgnoredReason::NotOwner {
                sender: a.clone(),
                target: b.clone()
            })]
        );
        assert_eq!(relay.status_of(&b), Some(&PlayerStatus::Connected));

        relay.on_message(&b, &update(&b, "ready")).unwrap();
        assert_eq!(relay.status_of(&b), Some(&PlayerStatus::Ready));
    }

    #[test]
    fn test_disconnect_broadcasts_once() {
        let mut relay = relay();
        let (a, a_sink) = join(&mut relay);
        let (b, b_sink) = join(&mut relay);
        clear(&[&a_sink, &b_sink]);

        assert_eq!(
            relay.on_disconnect(&b),
            Some(RelayEvent::PlayerDisconnected {
                player_id: b.clone()
            })
        );
        assert_eq!(relay.on_disconnect(&b), None);

        assert_eq!(
            a_sink.take_decoded(),
            vec![ServerMessage::PlayerDisconnected { player_id: b }]
        );
        assert!(b_sink.messages().is_empty());
        assert!(relay.contains(&a));
        assert_eq!(relay.len(), 1);
    }

    #[test]
    fn test_disconnect_drops_requirement_for_all_ready() {
        let mut relay = relay();
        let (a, _) = join(&mut relay);
        let (b, _) = join(&mut relay);
        relay.on_message(&a, &update(&a, "ready")).unwrap();
        assert!(relay.check_all_ready().is_none());

        relay.on_disconnect(&b);
        assert!(relay.check_all_ready().is_some());
    }

    #[test]
    fn test_closed_recipient_does_not_block_others() {
        let mut relay = relay();
        let (a, _a_sink) = join(&mut relay);
        let (_b, b_sink) = join(&mut relay);
        let (_c, c_sink) = join(&mut relay);
        b_sink.close();
        c_sink.take();

        relay.on_message(&a, &update(&a, "ready")).unwrap();
        assert_eq!(c_sink.take_decoded().len(), 1);
    }

    #[test]
    fn test_ids_are_unique_across_churn() {
        let mut relay = relay();
        let mut live = Vec::new();
        for round in 0..20 {
            let (id, _) = join(&mut relay);
            assert!(!live.contains(&id));
            live.push(id);
            if round % 3 == 0 {
                let gone = live.remove(0);
                relay.on_disconnect(&gone);
            }
        }
        assert_eq!(relay.len(), live.len());
    }
}
