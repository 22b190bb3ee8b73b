use cucumber::{given, then, when};
use lobby_relay_core::{LobbyRelay, PlayerStatus, RelayPolicy, ServerMessage};
use lobby_relay_tests::LobbyWorld;
use std::collections::HashSet;

// ===== Given Steps =====

#[given("the lobby is empty")]
async fn lobby_is_empty(world: &mut LobbyWorld) {
    assert!(world.relay.is_empty());
}

#[given("the lobby only accepts status updates from their owners")]
async fn lobby_enforces_ownership(world: &mut LobbyWorld) {
    assert!(world.relay.is_empty(), "Policy must be set before anyone joins");
    world.relay = LobbyRelay::new(RelayPolicy {
        enforce_status_ownership: true,
        ..Default::default()
    });
}

#[given(expr = "{string} has joined the lobby")]
async fn player_has_joined(world: &mut LobbyWorld, name: String) {
    world.connect(&name);
    world.clear_inboxes();
}

#[given(expr = "players {string} and {string} have joined the lobby")]
async fn two_players_have_joined(world: &mut LobbyWorld, first: String, second: String) {
    world.connect(&first);
    world.connect(&second);
    world.clear_inboxes();
}

#[given(expr = "players {string}, {string} and {string} have joined the lobby")]
async fn three_players_have_joined(
    world: &mut LobbyWorld,
    first: String,
    second: String,
    third: String,
) {
    for name in [first, second, third] {
        world.connect(&name);
    }
    world.clear_inboxes();
}

// ===== When Steps =====

#[when(expr = "{string} connects")]
async fn player_connects(world: &mut LobbyWorld, name: String) {
    world.connect(&name);
}

#[when(expr = "{string} disconnects")]
async fn player_disconnects(world: &mut LobbyWorld, name: String) {
    world.last_events = world.disconnect(&name).into_iter().collect();
}

#[when(expr = "the connection of {string} closes again")]
async fn connection_closes_again(world: &mut LobbyWorld, name: String) {
    world.last_events = world.disconnect(&name).into_iter().collect();
}

// ===== Then Steps =====

#[then(expr = "{string} receives its assigned id")]
async fn receives_assigned_id(world: &mut LobbyWorld, name: String) {
    let id = world.id_of(&name);
    assert_eq!(
        world.next_message(&name),
        Some(ServerMessage::SetUniqueId { id })
    );
}

#[then(expr = "{string} is told {string} connected")]
async fn told_player_connected(world: &mut LobbyWorld, name: String, other: String) {
    let player_id = world.id_of(&other);
    assert_eq!(
        world.next_message(&name),
        Some(ServerMessage::PlayerConnected {
            player_id,
            status: PlayerStatus::Connected,
        })
    );
}

#[then(expr = "{string} is told {string} disconnected")]
async fn told_player_disconnected(world: &mut LobbyWorld, name: String, other: String) {
    let player_id = world.id_of(&other);
    assert_eq!(
        world.next_message(&name),
        Some(ServerMessage::PlayerDisconnected { player_id })
    );
}

#[then(expr = "{string} receives nothing")]
async fn receives_nothing(world: &mut LobbyWorld, name: String) {
    assert_eq!(world.next_message(&name), None);
}

#[then("no disconnect is reported")]
async fn no_disconnect_reported(world: &mut LobbyWorld) {
    assert!(world.last_events.is_empty());
}

#[then("every assigned id is unique")]
async fn assigned_ids_are_unique(world: &mut LobbyWorld) {
    let unique: HashSet<_> = world.assigned_ids.iter().collect();
    assert_eq!(unique.len(), world.assigned_ids.len());
}

#[then(expr = "the lobby has {int} player(s)")]
async fn lobby_has_players(world: &mut LobbyWorld, count: usize) {
    assert_eq!(world.relay.len(), count);
}

#[then(expr = "{string} is no longer in the lobby")]
async fn player_not_in_lobby(world: &mut LobbyWorld, name: String) {
    let id = world.id_of(&name);
    assert!(!world.relay.contains(&id));
}
