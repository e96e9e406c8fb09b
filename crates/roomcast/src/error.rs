//! Unified error type for roomcast, and the reasons a client message can
//! be refused.

use roomcast_protocol::ServerMessage;
use roomcast_room::RoomError;
use roomcast_transport::TransportError;

/// Errors surfaced by the server itself.
///
/// Per-connection failures never reach here: they end that connection and
/// are logged. Room and decode failures become a [`Rejection`] instead.
#[derive(Debug, thiserror::Error)]
pub enum RoomcastError {
    /// Binding or accepting on the listener failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Why one inbound message was refused.
///
/// The `Display` text is exactly what the sender receives in
/// `{"type":"error","message":...}`. A rejection never changes room state
/// and never ends the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("invalid message format")]
    Malformed,

    #[error("unknown message type")]
    UnknownType,

    #[error("roomCode and playerName are required")]
    MissingJoinFields,

    #[error("room not found")]
    RoomNotFound,

    #[error("not in a room")]
    NotInRoom,

    #[error("player data is required")]
    MissingPlayer,
}

impl From<RoomError> for Rejection {
    fn from(err: RoomError) -> Self {
        match err {
            // A room closed mid-join is as gone as one that never existed.
            RoomError::Closed(_) => Self::RoomNotFound,
        }
    }
}

impl From<Rejection> for ServerMessage {
    fn from(rejection: Rejection) -> Self {
        ServerMessage::Error {
            message: rejection.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use roomcast_protocol::RoomCode;

    use super::*;

    #[test]
    fn test_from_transport_error_keeps_message() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: RoomcastError = TransportError::Bind(io).into();
        assert!(matches!(err, RoomcastError::Transport(_)));
        assert!(err.to_string().contains("port taken"));
    }

    #[test]
    fn test_closed_room_rejects_as_not_found() {
        let rejection = Rejection::from(RoomError::Closed(RoomCode::from("AB23CD")));
        assert_eq!(rejection, Rejection::RoomNotFound);
    }

    #[test]
    fn test_rejection_becomes_error_message() {
        let msg = ServerMessage::from(Rejection::MissingJoinFields);
        assert_eq!(
            msg,
            ServerMessage::Error {
                message: "roomCode and playerName are required".into()
            }
        );
    }

    #[test]
    fn test_rejection_texts() {
        assert_eq!(Rejection::Malformed.to_string(), "invalid message format");
        assert_eq!(Rejection::UnknownType.to_string(), "unknown message type");
        assert_eq!(Rejection::RoomNotFound.to_string(), "room not found");
        assert_eq!(Rejection::NotInRoom.to_string(), "not in a room");
        assert_eq!(Rejection::MissingPlayer.to_string(), "player data is required");
    }
}
