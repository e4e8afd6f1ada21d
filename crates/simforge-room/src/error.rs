//! Error types for the room layer.

use simforge_protocol::{RobotId, RoomId, SessionId};
use simforge_sim::SimError;

/// Errors that can occur during room and registry operations.
///
/// All of these except [`RoomError::Sim`] are reported back to the client
/// that asked; none of them takes the host down.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The registry already holds its maximum number of rooms.
    #[error("room limit of {max} reached")]
    CapacityExceeded { max: usize },

    /// A session may belong to one room at a time.
    #[error("session {0} is already in room {1}")]
    AlreadyInRoom(SessionId, RoomId),

    #[error("session {0} is not in a room")]
    NotInRoom(SessionId),

    #[error("wrong password for room {0}")]
    InvalidPassword(RoomId),

    #[error("unknown environment {0:?}")]
    UnknownEnvironment(String),

    #[error("robot {0} not found")]
    RobotNotFound(RobotId),

    #[error("room {0} has no free robot slot")]
    RobotCapacityExceeded(RoomId),

    /// The physics layer refused an operation, typically during
    /// environment setup.
    #[error(transparent)]
    Sim(#[from] SimError),
}
