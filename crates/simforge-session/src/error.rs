//! Error types for the session layer.

use simforge_protocol::{ProtocolError, SessionId};

/// Errors that can occur while talking to a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The outbound payload could not be encoded into a frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The bridge writer is not keeping up; the frame was dropped.
    #[error("outbound queue for session {0} is full")]
    Backlogged(SessionId),

    /// The bridge writer is gone; nothing can reach this session any more.
    #[error("session {0} is closed")]
    Closed(SessionId),
}
