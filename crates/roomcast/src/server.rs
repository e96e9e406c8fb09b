//! `RoomcastServer` builder and accept loop.
//!
//! This is the entry point for running a hub. It ties the layers together:
//! transport → protocol → room, with one pump per connection.

use std::sync::Arc;
use std::time::Duration;

use roomcast_room::{RoomConfig, RoomManager};
use roomcast_transport::{Handshake, Transport, WebSocketTransport};

use crate::RoomcastError;
use crate::pump::{PumpConfig, handle_connection};

/// Builder for configuring and starting a roomcast server.
///
/// # Example
///
/// ```rust,ignore
/// use roomcast::prelude::*;
///
/// let server = RoomcastServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// let room = roomcast::api::create_room(server.manager()).await;
/// server.run().await
/// ```
pub struct RoomcastServerBuilder {
    bind_addr: String,
    pump: PumpConfig,
    room_config: RoomConfig,
    manager: Option<Arc<RoomManager>>,
}

impl RoomcastServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            pump: PumpConfig::default(),
            room_config: RoomConfig::default(),
            manager: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.pump.heartbeat_interval = interval;
        self
    }

    pub fn read_deadline(mut self, deadline: Duration) -> Self {
        self.pump.read_deadline = deadline;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.pump.write_timeout = timeout;
        self
    }

    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.pump.outbound_capacity = capacity;
        self
    }

    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.pump.max_frame_size = bytes;
        self
    }

    /// Replaces all per-connection limits at once.
    pub fn pump_config(mut self, config: PumpConfig) -> Self {
        self.pump = config;
        self
    }

    /// Room settings for the registry the builder creates. Ignored when a
    /// registry is injected with [`manager`](Self::manager).
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Uses an existing registry instead of creating one, so rooms can be
    /// created before (or outside of) the server.
    pub fn manager(mut self, manager: Arc<RoomManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Binds the listener and returns a server ready to [`run`](RoomcastServer::run).
    ///
    /// The listener refuses inbound messages above `max_frame_size` while
    /// reading them.
    pub async fn build(self) -> Result<RoomcastServer, RoomcastError> {
        let transport =
            WebSocketTransport::bind_with_limit(&self.bind_addr, self.pump.max_frame_size)
                .await?;
        let manager = self
            .manager
            .unwrap_or_else(|| Arc::new(RoomManager::new(self.room_config)));

        Ok(RoomcastServer {
            transport,
            manager,
            pump: self.pump,
        })
    }
}

impl Default for RoomcastServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound roomcast hub.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RoomcastServer {
    transport: WebSocketTransport,
    manager: Arc<RoomManager>,
    pump: PumpConfig,
}

impl RoomcastServer {
    /// Creates a new builder.
    pub fn builder() -> RoomcastServerBuilder {
        RoomcastServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The room registry this server routes joins through.
    pub fn manager(&self) -> &Arc<RoomManager> {
        &self.manager
    }

    /// Runs the accept loop.
    ///
    /// Each accepted stream gets its own task, which finishes the
    /// WebSocket upgrade and then runs the pump. A stalled handshake or a
    /// panicking pump only affects its own connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), RoomcastError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "roomcast server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let manager = Arc::clone(&self.manager);
                    let config = self.pump.clone();
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        match pending.complete().await {
                            Ok(conn) => handle_connection(conn, manager, config).await,
                            Err(e) => tracing::debug!(%peer, error = %e, "handshake failed"),
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
