//! Wire protocol for roomcast.
//!
//! This crate defines what travels between a browser and the hub:
//!
//! - **Types** ([`Player`], [`PlayerId`], [`RoomCode`], [`SessionId`]) —
//!   the player model and the identifiers that name things.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`RoomInfo`]) —
//!   the JSON objects exchanged over a connection, tagged by `"type"`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the room
//! engine (membership). It knows nothing about sockets or locks.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Room (membership)
//! Room (membership) → Protocol (ServerMessage) → Transport (bytes)
//! ```

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{ClientMessage, RoomInfo, ServerMessage};
pub use types::{Class, Gender, Player, PlayerId, Race, RoomCode, SessionId};
