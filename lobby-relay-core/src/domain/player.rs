use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity assigned to a connection when it joins the lobby
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        PlayerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        PlayerId(id.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        PlayerId(id)
    }
}

/// Client-reported state of a connection.
///
/// `ready` and `left` carry meaning for the relay; anything else a client
/// sends is kept verbatim in `Other` and passed through untouched.
///
/// Statuses compare by their wire text, so `Other("ready")` behaves exactly
/// like `Ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlayerStatus {
    /// Initial status of every freshly accepted connection
    Connected,
    /// Counts towards the all-ready condition
    Ready,
    /// Triggers an extra `player_left` broadcast
    Left,
    /// Free-form status, relayed opaquely
    Other(String),
}

impl PlayerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PlayerStatus::Connected => "connected",
            PlayerStatus::Ready => "ready",
            PlayerStatus::Left => "left",
            PlayerStatus::Other(status) => status,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.as_str() == "ready"
    }

    pub fn is_left(&self) -> bool {
        self.as_str() == "left"
    }
}

impl PartialEq for PlayerStatus {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for PlayerStatus {}

impl Hash for PlayerStatus {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        PlayerStatus::Connected
    }
}

impl From<String> for PlayerStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "connected" => PlayerStatus::Connected,
            "ready" => PlayerStatus::Ready,
            "left" => PlayerStatus::Left,
            _ => PlayerStatus::Other(status),
        }
    }
}

impl From<&str> for PlayerStatus {
    fn from(status: &str) -> Self {
        PlayerStatus::from(status.to_string())
    }
}

impl From<PlayerStatus> for String {
    fn from(status: PlayerStatus) -> Self {
        match status {
            PlayerStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of one tracked connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    #[serde(rename = "playerId")]
    pub player_id: PlayerId,
    pub status: PlayerStatus,
}
