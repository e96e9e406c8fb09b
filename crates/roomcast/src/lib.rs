//! # Roomcast
//!
//! Real-time presence hub. Clients join a room by code over a WebSocket,
//! publish their player stats, and every member of the room sees joins,
//! updates, and departures as they happen. A player whose connection drops
//! is kept as a ghost for a grace period and can rejoin with the same
//! session id without losing their stats.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomcast::prelude::*;
//!
//! # async fn start() -> Result<(), RoomcastError> {
//! let server = RoomcastServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! let room = roomcast::api::create_room(server.manager()).await;
//! println!("share this code: {}", room.code);
//! server.run().await
//! # }
//! ```

pub mod api;
mod error;
mod pump;
mod server;

pub use error::{Rejection, RoomcastError};
pub use pump::PumpConfig;
pub use server::{RoomcastServer, RoomcastServerBuilder};

// Re-export sub-crates so users only need `roomcast` in their Cargo.toml.
pub use roomcast_protocol as protocol;
pub use roomcast_room as room;
pub use roomcast_transport as transport;

/// Everything needed to run a hub.
pub mod prelude {
    pub use crate::{PumpConfig, Rejection, RoomcastError, RoomcastServer, RoomcastServerBuilder};
    pub use roomcast_protocol::{
        Class, ClientMessage, Gender, Player, PlayerId, Race, RoomCode, RoomInfo, ServerMessage,
        SessionId,
    };
    pub use roomcast_room::{Room, RoomConfig, RoomManager, SlotState};
}
