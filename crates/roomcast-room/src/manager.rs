//! Room registry: creates rooms, looks them up by code, and drops them
//! once empty.

use std::collections::HashMap;
use std::sync::Arc;

use roomcast_protocol::RoomCode;
use tokio::sync::RwLock;

use crate::{Room, RoomConfig};

/// Where new room codes come from.
///
/// The registry retries on collision, so a source only has to draw.
pub trait CodeSource: Send + Sync + 'static {
    fn next_code(&self) -> RoomCode;
}

/// Draws codes uniformly from [`RoomCode::ALPHABET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self) -> RoomCode {
        RoomCode::random()
    }
}

/// Every room the hub knows about, keyed by code.
///
/// Lock order is always registry before room: the registry lock may be
/// held while a room lock is taken, never the other way around. Rooms
/// reach back into the registry only after releasing their own lock.
pub struct RoomManager {
    rooms: RwLock<HashMap<RoomCode, Arc<Room>>>,
    config: RoomConfig,
    codes: Box<dyn CodeSource>,
}

impl RoomManager {
    /// Creates an empty registry drawing random codes.
    pub fn new(config: RoomConfig) -> Self {
        Self::with_code_source(config, RandomCodes)
    }

    pub fn with_code_source(config: RoomConfig, codes: impl CodeSource) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
            codes: Box::new(codes),
        }
    }

    /// Creates and registers a new empty room under a code no live room
    /// is using.
    pub async fn create_room(self: &Arc<Self>) -> Arc<Room> {
        let mut rooms = self.rooms.write().await;
        let code = loop {
            let candidate = self.codes.next_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
            tracing::debug!(room_code = %candidate, "room code collision, redrawing");
        };

        let room = Arc::new(Room::with_registry(
            code.clone(),
            self.config.clone(),
            Arc::downgrade(self),
        ));
        rooms.insert(code.clone(), Arc::clone(&room));
        tracing::info!(room_code = %code, rooms = rooms.len(), "room created");
        room
    }

    pub async fn get_room(&self, code: &RoomCode) -> Option<Arc<Room>> {
        self.rooms.read().await.get(code).cloned()
    }

    /// Unregisters a room regardless of occupancy. Idempotent.
    ///
    /// The room is closed so any caller still holding it cannot add
    /// players to a room nobody can find.
    pub async fn remove_room(&self, code: &RoomCode) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.remove(code) else {
            return false;
        };
        room.close().await;
        tracing::info!(room_code = %code, rooms = rooms.len(), "room removed");
        true
    }

    /// Unregisters the room if it has no live connections and no ghosts.
    ///
    /// The emptiness check and the removal happen under the registry write
    /// lock, and the room is closed in the same step, so a join racing
    /// with this call either lands before (and the room stays) or fails
    /// with [`RoomError::Closed`](crate::RoomError::Closed).
    pub async fn remove_if_empty(&self, code: &RoomCode) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get(code) else {
            return false;
        };
        if !room.close_if_empty().await {
            return false;
        }
        rooms.remove(code);
        tracing::info!(room_code = %code, rooms = rooms.len(), "empty room removed");
        true
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use roomcast_protocol::{Player, PlayerId, SessionId};
    use roomcast_transport::ConnectionId;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{ClientHandle, RoomError};

    /// Replays a fixed list of codes, then falls back to random ones.
    struct ScriptedCodes(Mutex<VecDeque<&'static str>>);

    impl ScriptedCodes {
        fn new(codes: &[&'static str]) -> Self {
            Self(Mutex::new(codes.iter().copied().collect()))
        }
    }

    impl CodeSource for ScriptedCodes {
        fn next_code(&self) -> RoomCode {
            match self.0.lock().unwrap().pop_front() {
                Some(code) => RoomCode::from(code),
                None => RoomCode::random(),
            }
        }
    }

    fn manager() -> Arc<RoomManager> {
        Arc::new(RoomManager::default())
    }

    #[tokio::test]
    async fn test_create_room_registers_it() {
        let mgr = manager();
        let room = mgr.create_room().await;

        assert_eq!(mgr.room_count().await, 1);
        let found = mgr.get_room(room.code()).await.expect("room registered");
        assert!(Arc::ptr_eq(&room, &found));
        assert_eq!(room.player_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_room_redraws_on_collision() {
        let mgr = Arc::new(RoomManager::with_code_source(
            RoomConfig::default(),
            ScriptedCodes::new(&["AB23CD", "AB23CD", "XY45ZW"]),
        ));

        let first = mgr.create_room().await;
        let second = mgr.create_room().await;

        assert_eq!(first.code().as_str(), "AB23CD");
        assert_eq!(second.code().as_str(), "XY45ZW");
        assert_eq!(mgr.room_count().await, 2);
    }

    #[tokio::test]
    async fn test_get_room_unknown_code_returns_none() {
        let mgr = manager();
        assert!(mgr.get_room(&RoomCode::from("ZZZZZZ")).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_room_is_idempotent() {
        let mgr = manager();
        let room = mgr.create_room().await;
        let code = room.code().clone();

        assert!(mgr.remove_room(&code).await);
        assert!(!mgr.remove_room(&code).await);
        assert_eq!(mgr.room_count().await, 0);
        assert!(room.is_closed().await);
    }

    #[tokio::test]
    async fn test_remove_if_empty_keeps_occupied_room() {
        let mgr = manager();
        let room = mgr.create_room().await;
        let (tx, _rx) = mpsc::channel(8);
        let client = ClientHandle::new(ConnectionId::new(1), PlayerId::from("p1"), tx);
        room.add_client(client, Player::starting(PlayerId::default(), "Alice"), None)
            .await
            .unwrap();

        assert!(!mgr.remove_if_empty(room.code()).await);
        assert_eq!(mgr.room_count().await, 1);
        assert!(!room.is_closed().await);
    }

    #[tokio::test]
    async fn test_remove_if_empty_drops_fresh_room_and_closes_it() {
        let mgr = manager();
        let room = mgr.create_room().await;

        assert!(mgr.remove_if_empty(room.code()).await);
        assert!(mgr.get_room(room.code()).await.is_none());

        let (tx, _rx) = mpsc::channel(8);
        let client = ClientHandle::new(ConnectionId::new(1), PlayerId::from("p1"), tx);
        let err = room
            .add_client(
                client,
                Player::starting(PlayerId::default(), "Late"),
                Some(SessionId::from("s")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::Closed(_)));
    }

    #[tokio::test]
    async fn test_remove_if_empty_unknown_code_is_noop() {
        let mgr = manager();
        assert!(!mgr.remove_if_empty(&RoomCode::from("NOPE22")).await);
    }
}
