//! Error types for the room layer.

use roomcast_protocol::RoomCode;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room was emptied and deregistered between lookup and join.
    /// Callers treat it as a room that does not exist.
    #[error("room {0} is closed")]
    Closed(RoomCode),
}
