//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The room engine encodes each outbound event exactly once and hands the
//! same bytes to every recipient, so the codec only has to be fast and
//! deterministic, not clever.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Turns messages into frame payloads and back.
///
/// Shared by every connection task, hence `Send + Sync + 'static`.
/// Decoded values own their data (`DeserializeOwned`) because the frame
/// buffer is dropped as soon as decoding finishes.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// [`ProtocolError::Encode`] if the value cannot be serialized.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// [`ProtocolError::Decode`] for malformed input or input that does
    /// not match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON over `serde_json`, the hub's wire format.
///
/// ```rust
/// use roomcast_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let msg: ClientMessage = JsonCodec.decode(br#"{"type":"leave_room"}"#).unwrap();
/// assert!(matches!(msg, ClientMessage::LeaveRoom { room_code: None, .. }));
///
/// // Absent optional fields stay absent on the way out.
/// assert_eq!(JsonCodec.encode(&msg).unwrap(), br#"{"type":"leave_room"}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
