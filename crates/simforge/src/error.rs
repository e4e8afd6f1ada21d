//! Unified error type for Simforge.

use simforge_protocol::ProtocolError;
use simforge_room::RoomError;
use simforge_session::SessionError;
use simforge_sim::SimError;
use simforge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SimforgeError {
    /// Bridge failure: spawning the edge, I/O on the channel, a loop task.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Sim(#[from] SimError),

    /// The tick loop task panicked or was cancelled.
    #[error("tick loop failed: {0}")]
    TickLoop(#[from] tokio::task::JoinError),

    #[error("usage: {0}")]
    Usage(String),
}
