//! Error types for the protocol layer.
//!
//! Each crate in roomcast defines its own error enum. A `ProtocolError`
//! always means the bytes and the Rust types did not line up; it never
//! says anything about room membership or the network.

/// Errors that can occur while turning messages into bytes and back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    ///
    /// With the JSON codec this is practically unreachable for our own
    /// message types, but the codec contract allows it.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a field with the wrong type, or a
    /// stat value outside its allowed set (e.g. `"race": "orc"`).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
