/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The edge process could not be started.
    #[error("failed to spawn edge process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The edge process was started without the piped stdio the bridge needs.
    #[error("edge process has no {0} pipe")]
    MissingPipe(&'static str),

    /// Reading from or writing to the channel failed.
    #[error("bridge I/O failed: {0}")]
    Io(#[source] std::io::Error),

    /// A background task of the bridge panicked or was aborted.
    #[error("bridge task failed: {0}")]
    Task(String),
}
