use crate::connection_handler::{ConnectionHandler, LobbyHandler};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::WebSocketUpgrade;
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};

pub fn handle_websocket(ws: WebSocketUpgrade, connection_handler: ConnectionHandler) -> Response {
    ws.on_upgrade(move |socket| listen(socket, connection_handler))
}

async fn listen(socket: WebSocket, connection_handler: ConnectionHandler) {
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let player_id = connection_handler.on_connect(tx).await;

    let sender_task = handle_outgoing_messages(rx, ws_sender);
    let receiver_task = handle_incoming_messages(ws_receiver, &connection_handler);

    tokio::select! {
        _ = sender_task => {
            debug!(%player_id, "Sender task completed");
        }
        _ = receiver_task => {
            debug!(%player_id, "Receiver task completed");
        }
    }

    info!(%player_id, "Client disconnected");
    connection_handler.on_disconnect().await;
}

/// Drain the socket's outbound queue. Ends when the queue is dropped (the
/// connection left the lobby) or the socket rejects a write.
pub async fn handle_outgoing_messages(
    mut rx: UnboundedReceiver<String>,
    mut ws_sender: SplitSink<WebSocket, Message>,
) {
    while let Some(text) = rx.recv().await {
        if let Err(e) = ws_sender.send(Message::Text(text)).await {
            error!("Failed to send message: {:?}", e);
            break;
        }
    }
}

pub async fn handle_incoming_messages(
    mut receiver: SplitStream<WebSocket>,
    connection_handler: &ConnectionHandler,
) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(frame)) => {
                debug!(?frame, "Close frame received");
                break;
            }
            Ok(message) => handle_message(message, connection_handler).await,
            Err(e) => {
                error!("Failed to receive message: {:?}", e);
                break;
            }
        }
    }
}

pub async fn handle_message(message: Message, connection_handler: &ConnectionHandler) {
    match message {
        Message::Text(text) => connection_handler.on_message(&text).await,
        Message::Binary(bytes) => match String::from_utf8(bytes) {
            Ok(text) => connection_handler.on_message(&text).await,
            Err(e) => warn!(
                player_id = ?connection_handler.player_id(),
                "Dropping non UTF-8 binary frame: {}",
                e
            ),
        },
        // Pings are answered by axum
        Message::Ping(_) | Message::Pong(_) => {}
        Message::Close(_) => {}
    }
}
