//! One room's membership: active players, live connections, the
//! session map, and ghosts.
//!
//! Every mutation takes the room's write lock, changes the maps, and fans
//! the resulting event out *before* releasing the lock. Fan-out never
//! blocks (each connection has a bounded queue and a full queue drops the
//! frame), so holding the lock across it is cheap and guarantees that
//! every recipient set is a consistent snapshot and that events reach
//! every connection in the same order.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use roomcast_protocol::{
    Codec, JsonCodec, Player, PlayerId, RoomCode, RoomInfo, ServerMessage, SessionId,
};
use roomcast_transport::ConnectionId;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::{RoomConfig, RoomError, RoomManager, SlotState};

/// An encoded outbound message. Encoded once per event and shared by every
/// recipient.
pub type OutboundFrame = Arc<[u8]>;

/// Sending half of a connection's bounded outbound queue.
pub type FrameSender = mpsc::Sender<OutboundFrame>;

// ---------------------------------------------------------------------------
// ClientHandle
// ---------------------------------------------------------------------------

/// The room's view of one live connection: who it is and how to reach it.
///
/// Equality and hashing go by [`ConnectionId`] only. Two handles built for
/// the same connection are the same client even if one was cloned before
/// the other.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    conn_id: ConnectionId,
    player_id: PlayerId,
    outbound: FrameSender,
}

impl ClientHandle {
    pub fn new(conn_id: ConnectionId, player_id: PlayerId, outbound: FrameSender) -> Self {
        Self {
            conn_id,
            player_id,
            outbound,
        }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// The player id this connection publishes under.
    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// Queues a frame without waiting.
    ///
    /// A full queue drops the frame: one stalled peer must never hold up a
    /// broadcast to the rest of the room. Returns `false` if the frame was
    /// not queued.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    conn_id = %self.conn_id,
                    player_id = %self.player_id,
                    "send buffer full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(conn_id = %self.conn_id, "send on closed connection");
                false
            }
        }
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.conn_id == other.conn_id
    }
}

impl Eq for ClientHandle {}

impl std::hash::Hash for ClientHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.conn_id.hash(state);
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A disconnected player's last known state and the task that will expire
/// it.
///
/// `generation` tells this ghost apart from any later ghost created for
/// the same session, so a timer that lost a race can never remove its
/// successor.
struct Ghost {
    player: Player,
    generation: u64,
    expiry: JoinHandle<()>,
}

#[derive(Default)]
struct Membership {
    players: HashMap<PlayerId, Player>,
    clients: HashMap<ConnectionId, ClientHandle>,
    sessions: HashMap<SessionId, PlayerId>,
    ghosts: HashMap<SessionId, Ghost>,
    next_generation: u64,
    /// Set once the registry has dropped this room. Nothing may enter a
    /// closed room.
    closed: bool,
}

impl Membership {
    fn is_empty(&self) -> bool {
        self.clients.is_empty() && self.ghosts.is_empty()
    }

    fn snapshot(&self) -> Vec<Player> {
        self.players
            .values()
            .chain(self.ghosts.values().map(|g| &g.player))
            .cloned()
            .collect()
    }

    /// Drops every session entry that points at `player_id`.
    fn forget_sessions_of(&mut self, player_id: &PlayerId) {
        self.sessions.retain(|_, pid| pid != player_id);
    }
}

/// One room and everything in it.
pub struct Room {
    code: RoomCode,
    config: RoomConfig,
    codec: JsonCodec,
    /// The registry this room lives in, told when an expiry empties it.
    registry: Weak<RoomManager>,
    state: RwLock<Membership>,
}

impl Room {
    /// Creates a standalone room that belongs to no registry.
    pub fn new(code: RoomCode, config: RoomConfig) -> Self {
        Self::with_registry(code, config, Weak::new())
    }

    pub(crate) fn with_registry(
        code: RoomCode,
        config: RoomConfig,
        registry: Weak<RoomManager>,
    ) -> Self {
        Self {
            code,
            config,
            codec: JsonCodec,
            registry,
            state: RwLock::new(Membership::default()),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    // -- Transitions --------------------------------------------------------

    /// Absent → Active.
    ///
    /// `player.id` is overwritten with the client's own id. If `session`
    /// already maps to another player, or names a ghost, that older entry
    /// is purged first and peers are told it left, so one session never
    /// shows up twice.
    ///
    /// Peers get `player_joined`; the new connection gets `room_state`.
    pub async fn add_client(
        &self,
        client: ClientHandle,
        mut player: Player,
        session: Option<SessionId>,
    ) -> Result<(), RoomError> {
        let mut m = self.state.write().await;
        if m.closed {
            return Err(RoomError::Closed(self.code.clone()));
        }

        let player_id = client.player_id().clone();
        let conn_id = client.conn_id();
        player.id = player_id.clone();

        if let Some(session) = session.filter(|s| !s.is_empty()) {
            let stale = m
                .sessions
                .get(&session)
                .filter(|old| **old != player_id)
                .cloned();
            if let Some(stale) = stale {
                m.players.remove(&stale);
                tracing::info!(room_code = %self.code, %session, player_id = %stale, "purged stale player for session");
                self.broadcast(&m, &ServerMessage::PlayerLeft { player_id: stale }, None);
            }
            if let Some(ghost) = m.ghosts.remove(&session) {
                ghost.expiry.abort();
                let player_id = ghost.player.id;
                tracing::info!(room_code = %self.code, %session, %player_id, "ghost superseded by fresh join");
                self.broadcast(&m, &ServerMessage::PlayerLeft { player_id }, None);
            }
            m.sessions.insert(session, player_id.clone());
        }

        m.clients.insert(conn_id, client.clone());
        m.players.insert(player_id.clone(), player.clone());

        tracing::info!(
            room_code = %self.code,
            %player_id,
            name = %player.name,
            players = m.players.len() + m.ghosts.len(),
            "player joined"
        );

        self.broadcast(&m, &ServerMessage::PlayerJoined { player }, Some(conn_id));
        self.send_room_state(&m, &client);
        Ok(())
    }

    /// Active → Absent (explicit leave).
    ///
    /// Returns the departed player's id, or `None` if the connection had no
    /// active player here (already removed, or superseded by a newer
    /// connection for the same session).
    pub async fn remove_client(&self, conn_id: ConnectionId) -> Option<PlayerId> {
        let mut m = self.state.write().await;
        let client = m.clients.remove(&conn_id)?;
        let player_id = client.player_id().clone();
        m.players.remove(&player_id)?;
        m.forget_sessions_of(&player_id);

        tracing::info!(room_code = %self.code, %player_id, "player left");
        self.broadcast(
            &m,
            &ServerMessage::PlayerLeft {
                player_id: player_id.clone(),
            },
            None,
        );
        Some(player_id)
    }

    /// Active → Ghost, or Active → Absent when there is no session.
    ///
    /// With a session the player is parked as a ghost for
    /// [`RoomConfig::ghost_grace`]; peers are told nothing yet. Without
    /// one there is nothing to rejoin with, so the player leaves at once.
    ///
    /// Returns the slot state the session ended up in.
    pub async fn disconnect_client(
        self: &Arc<Self>,
        conn_id: ConnectionId,
        session: Option<&SessionId>,
    ) -> SlotState {
        let mut m = self.state.write().await;
        let Some(client) = m.clients.remove(&conn_id) else {
            return SlotState::Absent;
        };
        let player_id = client.player_id().clone();
        let Some(player) = m.players.remove(&player_id) else {
            return SlotState::Absent;
        };
        m.forget_sessions_of(&player_id);

        let Some(session) = session.filter(|s| !s.is_empty()) else {
            tracing::info!(room_code = %self.code, %player_id, "player dropped without session");
            self.broadcast(&m, &ServerMessage::PlayerLeft { player_id }, None);
            return SlotState::Absent;
        };

        let generation = m.next_generation;
        m.next_generation += 1;
        let expiry = self.schedule_expiry(session.clone(), generation);
        let ghost = Ghost {
            player,
            generation,
            expiry,
        };
        if let Some(previous) = m.ghosts.insert(session.clone(), ghost) {
            previous.expiry.abort();
            self.broadcast(
                &m,
                &ServerMessage::PlayerLeft {
                    player_id: previous.player.id,
                },
                None,
            );
        }

        tracing::info!(
            room_code = %self.code,
            %player_id,
            %session,
            grace_secs = self.config.ghost_grace.as_secs(),
            "player moved to ghost state"
        );
        SlotState::Ghost
    }

    /// Ghost → Active.
    ///
    /// Restores the ghost's stats under the new connection's player id.
    /// Peers see `player_left` for the old id followed by `player_joined`
    /// for the new one; the rejoining connection gets `room_state`.
    ///
    /// Returns `Ok(None)` if the session has no ghost here.
    pub async fn rejoin_client(
        &self,
        client: ClientHandle,
        session: &SessionId,
    ) -> Result<Option<Player>, RoomError> {
        let mut m = self.state.write().await;
        if m.closed {
            return Err(RoomError::Closed(self.code.clone()));
        }
        let Some(ghost) = m.ghosts.remove(session) else {
            return Ok(None);
        };
        ghost.expiry.abort();

        let old_id = ghost.player.id.clone();
        let mut player = ghost.player;
        player.id = client.player_id().clone();
        let conn_id = client.conn_id();

        m.clients.insert(conn_id, client.clone());
        m.players.insert(player.id.clone(), player.clone());
        m.sessions.insert(session.clone(), player.id.clone());

        tracing::info!(
            room_code = %self.code,
            %session,
            old_id = %old_id,
            new_id = %player.id,
            "ghost rejoined"
        );

        self.broadcast(&m, &ServerMessage::PlayerLeft { player_id: old_id }, Some(conn_id));
        self.broadcast(
            &m,
            &ServerMessage::PlayerJoined {
                player: player.clone(),
            },
            Some(conn_id),
        );
        self.send_room_state(&m, &client);
        Ok(Some(player))
    }

    /// Ghost → Absent (explicit). Returns `true` if a ghost was removed.
    pub async fn cancel_ghost(&self, session: &SessionId) -> bool {
        if session.is_empty() {
            return false;
        }
        let mut m = self.state.write().await;
        let Some(ghost) = m.ghosts.remove(session) else {
            return false;
        };
        ghost.expiry.abort();
        let player_id = ghost.player.id;
        tracing::info!(room_code = %self.code, %session, %player_id, "ghost cancelled");
        self.broadcast(&m, &ServerMessage::PlayerLeft { player_id }, None);
        true
    }

    /// Active → Active: replace a player's stats.
    ///
    /// Updates for an id with no active record are dropped without any
    /// broadcast. Returns `true` if the update was applied.
    pub async fn update_player(&self, player: Player) -> bool {
        let mut m = self.state.write().await;
        let Some(slot) = m.players.get_mut(&player.id) else {
            tracing::debug!(room_code = %self.code, player_id = %player.id, "update for unknown player dropped");
            return false;
        };
        *slot = player.clone();
        tracing::debug!(room_code = %self.code, player_id = %player.id, power = player.power(), "player updated");
        self.broadcast(&m, &ServerMessage::PlayerUpdated { player }, None);
        true
    }

    /// Ghost → Absent (timer). A no-op unless the ghost for `session` is
    /// still the one this timer was armed for.
    async fn expire_ghost(&self, session: &SessionId, generation: u64) -> bool {
        let mut m = self.state.write().await;
        let armed = m
            .ghosts
            .get(session)
            .is_some_and(|g| g.generation == generation);
        if !armed {
            return false;
        }
        let Some(ghost) = m.ghosts.remove(session) else {
            return false;
        };
        let player_id = ghost.player.id;
        tracing::info!(room_code = %self.code, %session, %player_id, "ghost expired");
        self.broadcast(&m, &ServerMessage::PlayerLeft { player_id }, None);

        let now_empty = m.is_empty();
        drop(m);

        if now_empty {
            if let Some(registry) = self.registry.upgrade() {
                registry.remove_if_empty(&self.code).await;
            }
        }
        true
    }

    /// Spawns the grace-period timer for one ghost. Holds only a weak
    /// reference so a dropped room is not kept alive by its timers.
    fn schedule_expiry(self: &Arc<Self>, session: SessionId, generation: u64) -> JoinHandle<()> {
        let room = Arc::downgrade(self);
        let grace = self.config.ghost_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(room) = room.upgrade() {
                room.expire_ghost(&session, generation).await;
            }
        })
    }

    // -- Registry support ---------------------------------------------------

    /// Marks the room closed if it is empty. Once closed, joins fail with
    /// [`RoomError::Closed`]. Returns `true` if the room is (now) closed.
    pub(crate) async fn close_if_empty(&self) -> bool {
        let mut m = self.state.write().await;
        if m.closed {
            return true;
        }
        if m.is_empty() {
            m.closed = true;
        }
        m.closed
    }

    /// Marks the room closed unconditionally and disarms its timers.
    pub(crate) async fn close(&self) {
        let mut m = self.state.write().await;
        m.closed = true;
        for ghost in m.ghosts.values() {
            ghost.expiry.abort();
        }
    }

    // -- Queries ------------------------------------------------------------

    /// Active players plus ghosts. Ghosts still occupy a seat.
    pub async fn player_count(&self) -> usize {
        let m = self.state.read().await;
        m.players.len() + m.ghosts.len()
    }

    /// No live connections and no ghosts.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.is_empty()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }

    /// Every player a `room_state` would list: active first, then ghosts.
    pub async fn snapshot(&self) -> Vec<Player> {
        self.state.read().await.snapshot()
    }

    pub async fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            player_count: self.player_count().await,
        }
    }

    /// Where `session` currently stands in this room.
    pub async fn slot_state(&self, session: &SessionId) -> SlotState {
        let m = self.state.read().await;
        if m.ghosts.contains_key(session) {
            SlotState::Ghost
        } else if m.sessions.contains_key(session) {
            SlotState::Active
        } else {
            SlotState::Absent
        }
    }

    // -- Fan-out ------------------------------------------------------------

    fn encode(&self, msg: &ServerMessage) -> Option<OutboundFrame> {
        match self.codec.encode(msg) {
            Ok(bytes) => Some(bytes.into()),
            Err(e) => {
                tracing::error!(room_code = %self.code, error = %e, "failed to encode outbound message");
                None
            }
        }
    }

    /// Sends one encoded event to every registered connection except
    /// `except`.
    fn broadcast(&self, m: &Membership, msg: &ServerMessage, except: Option<ConnectionId>) {
        let Some(frame) = self.encode(msg) else {
            return;
        };
        for (conn_id, client) in &m.clients {
            if Some(*conn_id) != except {
                client.send(Arc::clone(&frame));
            }
        }
    }

    fn send_room_state(&self, m: &Membership, client: &ClientHandle) {
        let msg = ServerMessage::RoomState {
            room_code: self.code.clone(),
            players: m.snapshot(),
        };
        if let Some(frame) = self.encode(&msg) {
            client.send(frame);
        }
    }
}

impl Drop for Room {
    fn drop(&mut self) {
        // Timers hold weak references and would no-op anyway; aborting
        // just frees them early.
        for ghost in self.state.get_mut().ghosts.values() {
            ghost.expiry.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn client(n: u64) -> (ClientHandle, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = ClientHandle::new(
            ConnectionId::new(n),
            PlayerId::from(format!("p{n}").as_str()),
            tx,
        );
        (handle, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<OutboundFrame>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(serde_json::from_slice(&frame).expect("valid frame"));
        }
        out
    }

    fn room() -> Arc<Room> {
        Arc::new(Room::new(RoomCode::from("AB23CD"), RoomConfig::default()))
    }

    #[test]
    fn test_client_handle_equality_is_by_connection() {
        let (a, _rx1) = client(1);
        let (tx, _rx2) = mpsc::channel(1);
        let b = ClientHandle::new(ConnectionId::new(1), PlayerId::from("other"), tx);
        assert_eq!(a, b);
    }

    #[test]
    fn test_client_handle_send_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = ClientHandle::new(ConnectionId::new(1), PlayerId::from("p1"), tx);

        assert!(handle.send(Arc::from(&b"one"[..])));
        assert!(!handle.send(Arc::from(&b"two"[..])), "second frame is dropped");
        assert_eq!(&*rx.try_recv().unwrap(), b"one");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_ghost_with_stale_generation_is_noop() {
        let room = room();
        let (a, _rx_a) = client(1);
        let (b, mut rx_b) = client(2);
        let session = SessionId::from("s-a");

        room.add_client(a, Player::starting(PlayerId::default(), "Alice"), Some(session.clone()))
            .await
            .unwrap();
        room.add_client(b, Player::starting(PlayerId::default(), "Bob"), None)
            .await
            .unwrap();
        room.disconnect_client(ConnectionId::new(1), Some(&session)).await;
        drain(&mut rx_b);

        // Generation 0 is the live ghost; anything else is a stale timer.
        assert!(!room.expire_ghost(&session, 7).await);
        assert_eq!(room.slot_state(&session).await, SlotState::Ghost);
        assert!(drain(&mut rx_b).is_empty());

        assert!(room.expire_ghost(&session, 0).await);
        assert_eq!(room.slot_state(&session).await, SlotState::Absent);
        assert!(!room.expire_ghost(&session, 0).await, "second expiry is a no-op");
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_if_empty_refuses_occupied_room() {
        let room = room();
        let (a, _rx) = client(1);
        room.add_client(a, Player::starting(PlayerId::default(), "Alice"), None)
            .await
            .unwrap();

        assert!(!room.close_if_empty().await);
        room.remove_client(ConnectionId::new(1)).await;
        assert!(room.close_if_empty().await);

        let (b, _rx_b) = client(2);
        let err = room
            .add_client(b, Player::starting(PlayerId::default(), "Bob"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::Closed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ghost_timer_fires_after_grace() {
        let room = Arc::new(Room::new(
            RoomCode::from("AB23CD"),
            RoomConfig {
                ghost_grace: Duration::from_secs(5),
            },
        ));
        let (a, _rx_a) = client(1);
        let session = SessionId::from("s-a");
        room.add_client(a, Player::starting(PlayerId::default(), "Alice"), Some(session.clone()))
            .await
            .unwrap();
        room.disconnect_client(ConnectionId::new(1), Some(&session)).await;

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(room.slot_state(&session).await, SlotState::Ghost);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(room.slot_state(&session).await, SlotState::Absent);
        assert!(room.is_empty().await);
    }
}
