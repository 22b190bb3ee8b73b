use cucumber::{then, when};
use lobby_relay_core::{IgnoredReason, PlayerStatus, RelayEvent, ServerMessage};
use lobby_relay_tests::LobbyWorld;
use serde_json::json;

// ===== When Steps =====

#[when(expr = "{string} sets its status to {string}")]
async fn sets_own_status(world: &mut LobbyWorld, name: String, status: String) {
    world.update_status(&name, &name, &status);
}

#[when(expr = "{string} sets the status of {string} to {string}")]
async fn sets_other_status(world: &mut LobbyWorld, name: String, target: String, status: String) {
    world.update_status(&name, &target, &status);
}

#[when(expr = "{string} sets the status of an unknown player to {string}")]
async fn sets_unknown_status(world: &mut LobbyWorld, name: String, status: String) {
    let raw = json!({"action": "update_status", "playerId": "player-nobody", "status": status});
    world.send_raw(&name, &raw.to_string());
}

#[when(expr = "{string} sends text that is not JSON")]
async fn sends_malformed_text(world: &mut LobbyWorld, name: String) {
    world.send_raw(&name, "{\"action\": \"update_status\", ");
}

#[when(expr = "{string} sends the action {string}")]
async fn sends_action(world: &mut LobbyWorld, name: String, action: String) {
    world.send_raw(&name, &json!({ "action": action }).to_string());
}

#[when(expr = "{string} sends a status update without a status")]
async fn sends_update_without_status(world: &mut LobbyWorld, name: String) {
    let player_id = world.id_of(&name);
    let raw = json!({"action": "update_status", "playerId": player_id.as_str()});
    world.send_raw(&name, &raw.to_string());
}

// ===== Then Steps =====

#[then(expr = "{string} is told {string} is now {string}")]
async fn told_status_updated(world: &mut LobbyWorld, name: String, other: String, status: String) {
    let player_id = world.id_of(&other);
    assert_eq!(
        world.next_message(&name),
        Some(ServerMessage::StatusUpdated {
            player_id,
            status: PlayerStatus::from(status),
        })
    );
}

#[then(expr = "{string} is told {string} left")]
async fn told_player_left(world: &mut LobbyWorld, name: String, other: String) {
    let player_id = world.id_of(&other);
    assert_eq!(
        world.next_message(&name),
        Some(ServerMessage::PlayerLeft { player_id })
    );
}

#[then(expr = "{string} has status {string}")]
async fn player_has_status(world: &mut LobbyWorld, name: String, status: String) {
    let id = world.id_of(&name);
    assert_eq!(
        world.relay.status_of(&id),
        Some(&PlayerStatus::from(status))
    );
}

#[then("the message is dropped as malformed")]
async fn message_dropped_as_malformed(world: &mut LobbyWorld) {
    assert!(world.last_error.is_some(), "Expected a decode error");
    assert!(world.last_events.is_empty());
}

#[then("the message is ignored")]
async fn message_ignored(world: &mut LobbyWorld) {
    assert!(world.last_error.is_none());
    assert!(!world.last_events.is_empty());
    assert!(world
        .last_events
        .iter()
        .all(|event| matches!(event, RelayEvent::Ignored(_))));
}

#[then(expr = "the update is rejected because {string} does not own it")]
async fn update_rejected_not_owner(world: &mut LobbyWorld, name: String) {
    let sender = world.id_of(&name);
    assert!(world.last_events.iter().any(|event| matches!(
        event,
        RelayEvent::Ignored(IgnoredReason::NotOwner { sender: s, .. }) if *s == sender
    )));
}
