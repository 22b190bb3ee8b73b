//! Wire protocol: compact JSON objects discriminated by an `action` field.

use crate::domain::{PlayerId, PlayerStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages the relay sends to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Directed to a newly accepted connection only
    SetUniqueId { id: PlayerId },

    PlayerConnected {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        status: PlayerStatus,
    },

    StatusUpdated {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        status: PlayerStatus,
    },

    /// Follows `StatusUpdated` when the new status is `left`
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },

    /// Sent to every open connection, including the one that triggered it
    AllReady,

    PlayerDisconnected {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
}

impl ServerMessage {
    pub fn action(&self) -> &'static str {
        match self {
            ServerMessage::SetUniqueId { .. } => "set_unique_id",
            ServerMessage::PlayerConnected { .. } => "player_connected",
            ServerMessage::StatusUpdated { .. } => "status_updated",
            ServerMessage::PlayerLeft { .. } => "player_left",
            ServerMessage::AllReady => "all_ready",
            ServerMessage::PlayerDisconnected { .. } => "player_disconnected",
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages clients send to the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    UpdateStatus {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        status: PlayerStatus,
    },
    AllReadyCheck,
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Errors raised while decoding client input
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Message is not a JSON object")]
    NotAnObject,

    #[error("Missing or non-text field: {0}")]
    MissingField(&'static str),
}

/// Result of decoding one client frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command(ClientMessage),
    /// Well-formed record whose `action` the relay does not handle
    UnknownAction(Option<String>),
}

/// Decode a text frame.
///
/// Only text that is not JSON, or JSON that is not an object, is an error.
/// Fields are read by name and anything an action does not use is ignored,
/// whatever its type. An `update_status` whose `playerId` or `status` is
/// absent or not a string yields `ProtocolError::MissingField`.
pub fn decode(raw: &str) -> Result<Inbound, ProtocolError> {
    let Value::Object(fields) = serde_json::from_str::<Value>(raw)? else {
        return Err(ProtocolError::NotAnObject);
    };
    let text = |name: &'static str| {
        fields
            .get(name)
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingField(name))
    };

    match fields.get("action") {
        Some(Value::String(action)) if action == "update_status" => {
            let player_id = PlayerId::from(text("playerId")?);
            let status = PlayerStatus::from(text("status")?);
            Ok(Inbound::Command(ClientMessage::UpdateStatus { player_id, status }))
        }
        Some(Value::String(action)) if action == "all_ready_check" => {
            Ok(Inbound::Command(ClientMessage::AllReadyCheck))
        }
        Some(Value::String(action)) => Ok(Inbound::UnknownAction(Some(action.clone()))),
        Some(Value::Null) | None => Ok(Inbound::UnknownAction(None)),
        Some(other) => Ok(Inbound::UnknownAction(Some(other.to_string()))),
    }
}
