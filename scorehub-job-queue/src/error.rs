//! Error types for the job queue system.

use thiserror::Error;

/// Errors that may occur while interacting with the job queue.
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    #[error("a worker is already registered for queue {0}")]
    WorkerAlreadyRegistered(String),

    #[error("invalid job options: {0}")]
    InvalidOptions(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("job execution failed: {0}")]
    ExecutionFailed(String),

    #[error("job timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl JobQueueError {
    /// Shorthand used by workers to report an operational failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed(message.into())
    }

    /// Whether a job that failed with this error may be attempted again.
    /// A payload the worker cannot read fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidPayload(_))
    }
}

/// Errors raised by a [`JobStore`](crate::JobStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
