//! Room creation and lookup for whatever outer surface fronts the hub
//! (an HTTP handler, a CLI, a test).

use std::sync::Arc;

use roomcast_protocol::{RoomCode, RoomInfo};
use roomcast_room::RoomManager;

/// Creates a fresh empty room and returns its summary.
pub async fn create_room(manager: &Arc<RoomManager>) -> RoomInfo {
    manager.create_room().await.info().await
}

/// Looks up a room by code. Input is normalized, so `" ab23cd"` finds
/// `"AB23CD"`.
pub async fn room_info(manager: &RoomManager, code: &str) -> Option<RoomInfo> {
    let room = manager.get_room(&RoomCode::normalized(code)).await?;
    Some(room.info().await)
}
