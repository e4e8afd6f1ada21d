//! Error types for the protocol layer.
//!
//! Each crate in Simforge defines its own error enum. When you see a
//! `ProtocolError`, the problem is in framing or (de)serialization, not in
//! the pipe to the edge process or in room management.

/// Errors that can occur while parsing or producing bridge frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an outbound payload to JSON failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The payload of an inbound message is not valid JSON.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The line does not follow the frame grammar (empty line, unknown
    /// kind tag, truncated session identifier, missing event name).
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A session identifier is not exactly 20 ASCII characters.
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),
}
