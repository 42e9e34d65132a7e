//! Job execution errors.

use std::path::PathBuf;

use scorehub_job_queue::JobQueueError;
use thiserror::Error;

/// Errors that may occur while a worker handles a job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unsupported job type: {0}")]
    UnsupportedType(String),

    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("{0}")]
    Failed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl JobError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }
}

impl From<JobError> for JobQueueError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::InvalidPayload(msg) => JobQueueError::InvalidPayload(msg),
            JobError::UnsupportedType(t) => {
                JobQueueError::InvalidPayload(format!("unsupported job type: {t}"))
            }
            other => JobQueueError::ExecutionFailed(other.to_string()),
        }
    }
}

/// Deserialize a job payload, mapping failures to [`JobError::InvalidPayload`].
pub(crate) fn parse_payload<T: serde::de::DeserializeOwned>(
    data: serde_json::Value,
) -> Result<T, JobError> {
    serde_json::from_value(data).map_err(|e| JobError::invalid(e.to_string()))
}
