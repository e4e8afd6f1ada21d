//! Error types for the simulation layer.

use crate::BodyHandle;

/// Errors raised while building or mutating a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The active physics backend cannot express the requested body,
    /// e.g. a non-colliding overlap volume. Fatal to the construction of
    /// the entity that asked for it.
    #[error("physics backend does not support {0}")]
    UnsupportedByBackend(&'static str),

    /// Body and entity names are unique within one instance.
    #[error("name {0:?} is already in use")]
    DuplicateName(String),

    #[error("unknown entity {0:?}")]
    UnknownEntity(String),

    /// The handle was removed or belongs to another backend.
    #[error("unknown body {0}")]
    UnknownBody(BodyHandle),

    /// Non-positive or non-finite dimensions or mass.
    #[error("invalid shape: {0}")]
    InvalidShape(String),
}
