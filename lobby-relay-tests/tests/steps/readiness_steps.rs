use cucumber::{then, when};
use lobby_relay_core::{ClientMessage, RelayEvent, ServerMessage};
use lobby_relay_tests::LobbyWorld;

#[when(expr = "{string} asks whether everyone is ready")]
async fn asks_all_ready(world: &mut LobbyWorld, name: String) {
    world.send(&name, &ClientMessage::AllReadyCheck);
}

#[when("the relay checks readiness on an empty lobby")]
async fn check_empty_lobby(world: &mut LobbyWorld) {
    world.last_events = world.relay.check_all_ready().into_iter().collect();
}

#[then(expr = "{string} is told everyone is ready")]
async fn told_all_ready(world: &mut LobbyWorld, name: String) {
    assert_eq!(world.next_message(&name), Some(ServerMessage::AllReady));
}

#[then(expr = "all ready reached {int} player(s)")]
async fn all_ready_reached(world: &mut LobbyWorld, count: usize) {
    assert!(world
        .last_events
        .contains(&RelayEvent::AllReady { recipients: count }));
}

#[then("nobody is told everyone is ready")]
async fn nobody_told_all_ready(world: &mut LobbyWorld) {
    let names: Vec<String> = world.players.keys().cloned().collect();
    for name in names {
        while let Some(message) = world.next_message(&name) {
            assert_ne!(message, ServerMessage::AllReady, "{} was told all ready", name);
        }
    }
    assert!(!world
        .last_events
        .iter()
        .any(|event| matches!(event, RelayEvent::AllReady { .. })));
}
