use crate::connection_handler::{ConnectionHandler, SharedRelay};
use crate::websocket_listener;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use lobby_relay_core::PlayerSnapshot;

/// `/` upgrades to the relay socket; `/lobby` lists who is connected
pub fn create_relay_route(relay: SharedRelay) -> Router {
    Router::new()
        .route("/", get(upgrade))
        .route("/lobby", get(lobby_snapshot))
        .with_state(relay)
}

async fn upgrade(State(relay): State<SharedRelay>, ws: WebSocketUpgrade) -> Response {
    websocket_listener::handle_websocket(ws, ConnectionHandler::new(relay))
}

async fn lobby_snapshot(State(relay): State<SharedRelay>) -> Json<Vec<PlayerSnapshot>> {
    Json(relay.lock().await.snapshot())
}
