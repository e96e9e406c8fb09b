//! Per-connection pump: inbound dispatch, outbound writes, liveness, and
//! teardown.
//!
//! Each accepted connection gets two Tokio tasks:
//!   1. the inbound loop (this module's [`handle_connection`]), which
//!      decodes frames and applies them to the room,
//!   2. the outbound writer, which drains the connection's bounded queue
//!      and sends a ping every heartbeat interval.
//!
//! Rooms never write to a socket. They push encoded frames into the queue
//! through a [`ClientHandle`], so a slow peer only ever stalls its own
//! writer.

use std::sync::Arc;
use std::time::Duration;

use roomcast_protocol::{
    ClientMessage, Codec, JsonCodec, Player, PlayerId, RoomCode, ServerMessage, SessionId,
};
use roomcast_room::{ClientHandle, OutboundFrame, Room, RoomManager};
use roomcast_transport::{Connection, ConnectionId, Frame, WebSocketConnection};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::Rejection;

// ---------------------------------------------------------------------------
// PumpConfig
// ---------------------------------------------------------------------------

/// Liveness and buffering limits applied to every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpConfig {
    /// How often the writer pings the peer. Must be shorter than
    /// `read_deadline` or idle peers time out between pings.
    pub heartbeat_interval: Duration,
    /// Longest silence tolerated from the peer. Any frame resets it,
    /// including ping and pong.
    pub read_deadline: Duration,
    /// Longest a single write may take before the connection is dropped.
    pub write_timeout: Duration,
    /// Outbound queue length. Frames beyond it are dropped.
    pub outbound_capacity: usize,
    /// Largest inbound payload accepted, in bytes. Anything bigger ends
    /// the connection. The transport enforces it while reading; the pump
    /// checks it again for transports that cannot.
    pub max_frame_size: usize,
}

impl PumpConfig {
    pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(54);
    pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(60);
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 4096;
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Self::DEFAULT_HEARTBEAT_INTERVAL,
            read_deadline: Self::DEFAULT_READ_DEADLINE,
            write_timeout: Self::DEFAULT_WRITE_TIMEOUT,
            outbound_capacity: Self::DEFAULT_OUTBOUND_CAPACITY,
            max_frame_size: Self::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Seat: the connection's current room, with teardown on drop
// ---------------------------------------------------------------------------

/// The room a connection is in, and the session it joined with.
struct Membership {
    room: Arc<Room>,
    session: Option<SessionId>,
    /// Last display name published, reused when an update omits one.
    name: String,
}

impl Membership {
    /// Explicit leave: the player is gone for good.
    async fn leave(self, conn_id: ConnectionId, manager: &RoomManager) {
        self.room.remove_client(conn_id).await;
        manager.remove_if_empty(self.room.code()).await;
    }

    /// The transport went away. With a session the player becomes a
    /// ghost; without one this is the same as a leave.
    async fn drop_connection(self, conn_id: ConnectionId, manager: &RoomManager) {
        self.room
            .disconnect_client(conn_id, self.session.as_ref())
            .await;
        manager.remove_if_empty(self.room.code()).await;
    }
}

/// Holds the connection's membership and guarantees teardown.
///
/// The normal path calls [`Seat::release`] and awaits it. If the pump
/// exits any other way (early `?` return or panic) `Drop` spawns the same
/// teardown so the room never keeps a dead connection.
struct Seat {
    conn_id: ConnectionId,
    manager: Arc<RoomManager>,
    membership: Option<Membership>,
}

impl Seat {
    fn new(conn_id: ConnectionId, manager: Arc<RoomManager>) -> Self {
        Self {
            conn_id,
            manager,
            membership: None,
        }
    }

    async fn release(mut self) {
        if let Some(membership) = self.membership.take() {
            membership
                .drop_connection(self.conn_id, &self.manager)
                .await;
        }
    }
}

impl Drop for Seat {
    fn drop(&mut self) {
        let Some(membership) = self.membership.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let conn_id = self.conn_id;
        let manager = Arc::clone(&self.manager);
        tracing::warn!(%conn_id, room_code = %membership.room.code(), "pump exited abnormally, tearing down");
        runtime.spawn(async move {
            membership.drop_connection(conn_id, &manager).await;
        });
    }
}

// ---------------------------------------------------------------------------
// Pump
// ---------------------------------------------------------------------------

struct Pump {
    client: ClientHandle,
    codec: JsonCodec,
    seat: Seat,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    manager: Arc<RoomManager>,
    config: PumpConfig,
) {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let player_id = PlayerId::random();
    tracing::debug!(%conn_id, %player_id, peer = %conn.peer_addr(), "handling new connection");

    let (outbound, queue) = mpsc::channel(config.outbound_capacity);
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), queue, config.clone()));

    let mut pump = Pump {
        client: ClientHandle::new(conn_id, player_id.clone(), outbound),
        codec: JsonCodec,
        seat: Seat::new(conn_id, manager),
    };

    loop {
        let frame = match tokio::time::timeout(config.read_deadline, conn.recv()).await {
            Ok(Ok(Some(frame))) => frame,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, %player_id, "connection closed by peer");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, %player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, %player_id, "read deadline expired");
                break;
            }
        };

        let data = match frame {
            Frame::Data(data) => data,
            Frame::Heartbeat => continue,
        };
        if data.len() > config.max_frame_size {
            tracing::warn!(%conn_id, size = data.len(), limit = config.max_frame_size, "oversized frame, dropping connection");
            break;
        }

        let outcome = match pump.codec.decode::<ClientMessage>(&data) {
            Ok(msg) => pump.dispatch(msg).await,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode client message");
                Err(Rejection::Malformed)
            }
        };
        if let Err(rejection) = outcome {
            pump.reject(rejection);
        }
    }

    let Pump { seat, .. } = pump;
    seat.release().await;
    writer.abort();
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close after teardown failed");
    }
}

impl Pump {
    fn conn_id(&self) -> ConnectionId {
        self.client.conn_id()
    }

    async fn dispatch(&mut self, msg: ClientMessage) -> Result<(), Rejection> {
        match msg {
            ClientMessage::JoinRoom {
                room_code,
                player_name,
                session_id,
            } => self.join(&room_code, &player_name, session_id).await,
            ClientMessage::UpdateStats { player } => self.update(player).await,
            ClientMessage::LeaveRoom {
                room_code,
                session_id,
            } => {
                self.leave(room_code, session_id).await;
                Ok(())
            }
            ClientMessage::Unknown => Err(Rejection::UnknownType),
        }
    }

    /// Joins a room, restoring the session's ghost if it has one there.
    async fn join(
        &mut self,
        room_code: &str,
        player_name: &str,
        session: Option<SessionId>,
    ) -> Result<(), Rejection> {
        let name = player_name.trim();
        if room_code.trim().is_empty() || name.is_empty() {
            return Err(Rejection::MissingJoinFields);
        }
        let code = RoomCode::normalized(room_code);
        let session = session.filter(|s| !s.is_empty());
        let room = self
            .seat
            .manager
            .get_room(&code)
            .await
            .ok_or(Rejection::RoomNotFound)?;

        if let Some(current) = self.seat.membership.take() {
            tracing::debug!(conn_id = %self.conn_id(), from = %current.room.code(), to = %code, "switching rooms");
            if current.room.code() == &code {
                // Leaving must not let the registry drop the room we are
                // about to re-enter.
                current.room.remove_client(self.conn_id()).await;
            } else {
                current.leave(self.conn_id(), &self.seat.manager).await;
            }
        }

        let restored = match &session {
            Some(session) => room.rejoin_client(self.client.clone(), session).await?,
            None => None,
        };
        let name = match restored {
            Some(player) => player.name,
            None => {
                let player = Player::starting(self.client.player_id().clone(), name);
                room.add_client(self.client.clone(), player, session.clone())
                    .await?;
                name.to_owned()
            }
        };

        self.seat.membership = Some(Membership {
            room,
            session,
            name,
        });
        Ok(())
    }

    /// Publishes new stats for the sender's own player.
    async fn update(&mut self, player: Option<Player>) -> Result<(), Rejection> {
        let membership = self.seat.membership.as_mut().ok_or(Rejection::NotInRoom)?;
        let mut player = player.ok_or(Rejection::MissingPlayer)?;

        player.id = self.client.player_id().clone();
        if player.name.trim().is_empty() {
            player.name.clone_from(&membership.name);
        } else {
            membership.name.clone_from(&player.name);
        }

        if !membership.room.update_player(player).await {
            tracing::debug!(conn_id = %self.client.conn_id(), "update ignored, player no longer active");
        }
        Ok(())
    }

    /// Explicit leave. A connection that is not in a room may still name
    /// a room and session to drop the ghost it left behind elsewhere.
    async fn leave(&mut self, room_code: Option<String>, session: Option<SessionId>) {
        let conn_id = self.conn_id();
        if let Some(membership) = self.seat.membership.take() {
            membership.leave(conn_id, &self.seat.manager).await;
            return;
        }

        let (Some(room_code), Some(session)) = (room_code, session) else {
            tracing::debug!(%conn_id, "leave while not in a room ignored");
            return;
        };
        let code = RoomCode::normalized(&room_code);
        let Some(room) = self.seat.manager.get_room(&code).await else {
            return;
        };
        if room.cancel_ghost(&session).await {
            self.seat.manager.remove_if_empty(&code).await;
        }
    }

    /// Sends an `error` message to this connection only.
    fn reject(&self, rejection: Rejection) {
        tracing::debug!(conn_id = %self.conn_id(), %rejection, "rejected client message");
        match self.codec.encode(&ServerMessage::from(rejection)) {
            Ok(bytes) => {
                self.client.send(bytes.into());
            }
            Err(e) => tracing::error!(error = %e, "failed to encode error message"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound writer
// ---------------------------------------------------------------------------

/// Drains the outbound queue and keeps the peer alive with pings.
///
/// Ends when every sender is gone, or on the first failed or timed-out
/// write. On a write failure the connection is closed so the inbound loop
/// notices promptly instead of waiting out its read deadline.
async fn write_loop(
    conn: Arc<WebSocketConnection>,
    mut queue: mpsc::Receiver<OutboundFrame>,
    config: PumpConfig,
) {
    let conn_id = conn.id();
    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + config.heartbeat_interval,
        config.heartbeat_interval,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let write = tokio::select! {
            frame = queue.recv() => match frame {
                Some(frame) => tokio::time::timeout(config.write_timeout, conn.send(&frame)).await,
                None => return,
            },
            _ = heartbeat.tick() => tokio::time::timeout(config.write_timeout, conn.ping()).await,
        };

        match write {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "write failed");
                break;
            }
            Err(_) => {
                tracing::warn!(%conn_id, "write timed out");
                break;
            }
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close after write failure failed");
    }
}
