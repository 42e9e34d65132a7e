//! What a scheduled task does when it fires.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use scorehub_job_queue::{EnqueueOptions, JobData, QueueEngine};
use tracing::debug;

use crate::error::TaskError;

type ActionFn = dyn Fn() -> BoxFuture<'static, Result<(), TaskError>> + Send + Sync;

/// The callable bound to a scheduled task.
#[derive(Clone)]
pub struct TaskAction {
    kind: &'static str,
    func: Arc<ActionFn>,
}

impl fmt::Debug for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskAction")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl TaskAction {
    /// Run `func` directly on every fire.
    pub fn inline<F, Fut>(func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            kind: "inline",
            func: Arc::new(move || Box::pin(func())),
        }
    }

    /// Enqueue a job on every fire, deferring the work to the queue engine
    /// so it gets retries and backoff.
    pub fn enqueue(
        engine: QueueEngine,
        queue: impl Into<String>,
        data: JobData,
        options: EnqueueOptions,
    ) -> Self {
        let queue = queue.into();
        Self {
            kind: "enqueue",
            func: Arc::new(move || {
                let engine = engine.clone();
                let queue = queue.clone();
                let data = data.clone();
                let options = options.clone();
                Box::pin(async move {
                    let job_id = engine.enqueue(&queue, data, options).await?;
                    debug!(queue = %queue, job_id = %job_id, "scheduled job enqueued");
                    Ok(())
                })
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub(crate) fn invoke(&self) -> BoxFuture<'static, Result<(), TaskError>> {
        (self.func)()
    }
}
