//! Messages exchanged over a connection.
//!
//! Both directions use "internally tagged" JSON: the variant name lives in
//! a `"type"` field next to the variant's own fields.
//!
//! ```text
//! {"type":"join_room","roomCode":"AB23CD","playerName":"Alice"}
//! {"type":"player_left","playerId":"3f2a..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::{Player, PlayerId, RoomCode, SessionId};

/// Client → server.
///
/// Required fields are decoded leniently (`#[serde(default)]`) so that a
/// missing `roomCode` is reported as "required" rather than as a generic
/// decode failure; the connection pump checks for emptiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// "Put me in this room." `sessionId` is optional; when it names a
    /// ghost in that room the ghost is restored instead of a fresh player
    /// being created.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        #[serde(default)]
        room_code: String,
        #[serde(default)]
        player_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },

    /// "Here are my new stats." The `id` inside is ignored; the server
    /// always applies the update to the sender's own record.
    UpdateStats {
        #[serde(default)]
        player: Option<Player>,
    },

    /// "I'm leaving the room for good."
    ///
    /// Both fields are optional and only matter on a connection that has
    /// not joined anything: naming a room and session there drops the
    /// ghost that session left behind, instead of letting it wait out the
    /// grace period.
    #[serde(rename_all = "camelCase")]
    LeaveRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },

    /// Any `type` this server does not understand.
    #[serde(other)]
    Unknown,
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot, sent only to a connection that just joined or
    /// rejoined. `players` includes ghosted players.
    #[serde(rename_all = "camelCase")]
    RoomState {
        room_code: RoomCode,
        players: Vec<Player>,
    },

    /// Someone entered (or re-entered under a new id).
    PlayerJoined { player: Player },

    /// Someone is gone, or an old id must be dropped after a rejoin.
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId },

    /// Someone changed their stats.
    PlayerUpdated { player: Player },

    /// The sender's last message was rejected. Only ever sent to the
    /// connection that caused it.
    Error { message: String },
}

/// Room summary exposed by the creation/lookup surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub code: RoomCode,
    /// Active players plus ghosts.
    pub player_count: usize,
}
