use scorehub_job_queue::JobQueueError;
use thiserror::Error;

/// Errors raised while defining or driving scheduled tasks.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task {0} is already defined")]
    DuplicateTask(String),

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("invalid cron expression {expression:?}: {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("task {task} failed: {message}")]
    ActionFailed { task: String, message: String },
}

/// Failure reported by a task action.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Queue(#[from] JobQueueError),

    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
