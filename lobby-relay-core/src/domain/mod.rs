pub mod connection;
pub mod ids;
pub mod player;

pub use connection::{BroadcastReport, Connection, ConnectionRegistry, StatusChange};
pub use ids::{IdGenerator, IdScheme, RandomIds, SequentialIds};
pub use player::{PlayerId, PlayerSnapshot, PlayerStatus};
