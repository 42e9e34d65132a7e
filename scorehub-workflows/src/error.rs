//! Orchestrator errors.

use scorehub_config::ConfigError;
use scorehub_job_queue::JobQueueError;
use scorehub_scheduler::SchedulerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow system is not initialized")]
    NotInitialized,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Queue(#[from] JobQueueError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
