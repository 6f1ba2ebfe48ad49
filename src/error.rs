//! Error types for the report queue.

/// Top-level error type for report scheduling, storage and identity.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Persisted queue could not be written or removed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The host data-generation callback failed.
    #[error("generator error: {0}")]
    Generator(String),

    /// The host sender raised an error instead of returning a status.
    #[error("send error: {0}")]
    Send(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Device or profile identity persistence error.
    #[error("identity error: {0}")]
    Identity(String),

    /// No tokio runtime was available to spawn the update worker.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The scheduler's update worker is no longer running.
    #[error("scheduler stopped")]
    Stopped,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ReportError>;
