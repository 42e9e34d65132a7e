//! Worker trait for implementing queue handlers.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::JobQueueError;
use crate::types::JobData;

/// Trait for implementing queue workers.
///
/// Each named queue has at most one worker. The worker only sees the job's
/// [`JobData`]; retry bookkeeping belongs to the engine.
#[async_trait]
pub trait QueueWorker: Send + Sync {
    /// Returns the queue this worker drains.
    fn queue(&self) -> &str;

    /// Execute one job.
    ///
    /// Returns `Ok(())` on success, or an error describing the failure. Any
    /// error other than [`JobQueueError::InvalidPayload`] makes the job
    /// eligible for a retry.
    async fn execute(&self, job: JobData) -> Result<(), JobQueueError>;
}

type WorkerFn = dyn Fn(JobData) -> BoxFuture<'static, Result<(), JobQueueError>> + Send + Sync;

/// Adapts an async closure into a [`QueueWorker`].
#[derive(Clone)]
pub struct FnWorker {
    queue: String,
    func: Arc<WorkerFn>,
}

impl FnWorker {
    pub fn new<F, Fut>(queue: impl Into<String>, func: F) -> Self
    where
        F: Fn(JobData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobQueueError>> + Send + 'static,
    {
        Self {
            queue: queue.into(),
            func: Arc::new(move |job| Box::pin(func(job))),
        }
    }
}

impl fmt::Debug for FnWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnWorker")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl QueueWorker for FnWorker {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn execute(&self, job: JobData) -> Result<(), JobQueueError> {
        (self.func)(job).await
    }
}
