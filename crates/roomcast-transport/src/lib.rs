//! Transport layer for roomcast.
//!
//! The room engine never touches a socket. A pump reads [`Frame`]s from a
//! [`Connection`] and writes raw payloads back; rooms only ever see the
//! connection's [`ConnectionId`].
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Names one physical connection for its whole lifetime.
///
/// Equal ids mean the same connection. Ids handed out by
/// [`ConnectionId::next`] are never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw value. Meant for tests and custom transports; accepted
    /// connections get theirs from [`ConnectionId::next`].
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocates a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a read from the peer produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An application payload, text or binary.
    Data(Vec<u8>),

    /// A ping or pong. No payload, but proof the peer is alive, so it
    /// still counts against the read deadline.
    Heartbeat,
}

/// Listens for peers.
pub trait Transport: Send + Sync + 'static {
    type Pending: Handshake<Connection = Self::Connection, Error = Self::Error>;
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer. Only the raw accept happens here; the
    /// upgrade is left to [`Handshake::complete`] so the caller can run it
    /// off the accept loop.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// An accepted peer whose wire-protocol upgrade is still outstanding.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    async fn complete(self) -> Result<Self::Connection, Self::Error>;
}

/// One duplex connection.
///
/// Everything takes `&self`: a reader task parks in [`recv`] while a
/// writer task calls [`send`] and [`ping`] on the same value. The read and
/// write halves must not share a lock.
///
/// [`recv`]: Connection::recv
/// [`ping`]: Connection::ping
/// [`send`]: Connection::send
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes one payload.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads the next frame. `Ok(None)` means the peer closed cleanly.
    async fn recv(&self) -> Result<Option<Frame>, Self::Error>;

    /// Sends a liveness probe. The answer comes back through
    /// [`recv`](Connection::recv) as [`Frame::Heartbeat`].
    async fn ping(&self) -> Result<(), Self::Error>;

    /// Starts the closing handshake.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_connection_id_next_never_repeats() {
        let ids: HashSet<_> = (0..1000).map(|_| ConnectionId::next()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_connection_id_equality_follows_raw_value() {
        assert_eq!(ConnectionId::new(42), ConnectionId::new(42));
        assert_ne!(ConnectionId::new(42), ConnectionId::new(43));
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }
}
