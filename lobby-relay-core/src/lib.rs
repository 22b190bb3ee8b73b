//! Lobby state and broadcast rules for the lobby relay, independent of any
//! transport.
//!
//! - `domain`: player ids and statuses, id generation, the connection registry
//! - `protocol`: the action-tagged JSON messages exchanged with clients
//! - `sink`: the outbound half of a stream handle
//! - `relay`: connect/message/disconnect handlers over the registry

pub mod domain;
pub mod protocol;
pub mod relay;
pub mod sink;

pub use domain::{
    BroadcastReport, Connection, ConnectionRegistry, IdGenerator, IdScheme, PlayerId,
    PlayerSnapshot, PlayerStatus, RandomIds, SequentialIds, StatusChange,
};
pub use protocol::{ClientMessage, Inbound, ProtocolError, ServerMessage};
pub use relay::{IgnoredReason, LobbyRelay, RelayEvent, RelayPolicy};
pub use sink::{DeliveryError, MemorySink, MessageSink};
