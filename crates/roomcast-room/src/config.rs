//! Room configuration and the per-session slot state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room a [`RoomManager`](crate::RoomManager)
/// creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How long a disconnected player is kept as a ghost before peers are
    /// told they left.
    pub ghost_grace: Duration,
}

impl RoomConfig {
    /// Grace period used when nothing else is configured.
    pub const DEFAULT_GHOST_GRACE: Duration = Duration::from_secs(120);
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            ghost_grace: Self::DEFAULT_GHOST_GRACE,
        }
    }
}

// ---------------------------------------------------------------------------
// SlotState
// ---------------------------------------------------------------------------

/// Where a session currently stands inside one room.
///
/// ```text
///            add_client              disconnect_client(session)
///   Absent ─────────────→ Active ─────────────────────────────→ Ghost
///     ↑                    │  ↑                                   │
///     │   remove_client    │  └────────── rejoin_client ──────────┤
///     ├────────────────────┘                                      │
///     └──────────────── expiry / cancel_ghost ────────────────────┘
/// ```
///
/// - **Active**: player present, connection live.
/// - **Ghost**: player present, connection gone, expiry pending.
/// - **Absent**: no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Active,
    Ghost,
    Absent,
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Ghost => write!(f, "Ghost"),
            Self::Absent => write!(f, "Absent"),
        }
    }
}
