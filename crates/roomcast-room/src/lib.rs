//! Room membership for Roomcast.
//!
//! A [`Room`] holds active players, their live connections, and ghosts
//! (players whose connection dropped but who may still rejoin). The
//! [`RoomManager`] is the registry of rooms by code.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates rooms, finds them, removes empty ones
//! - [`Room`]: membership transitions and event fan-out
//! - [`ClientHandle`]: a room's handle on one connection's outbound queue
//! - [`SlotState`]: where a session stands in a room
//! - [`RoomConfig`]: ghost grace period

mod config;
mod error;
mod manager;
mod room;

pub use config::{RoomConfig, SlotState};
pub use error::RoomError;
pub use manager::{CodeSource, RandomCodes, RoomManager};
pub use room::{ClientHandle, FrameSender, OutboundFrame, Room};
