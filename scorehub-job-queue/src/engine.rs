//! Queue engine: named queues, worker dispatch, retries and persistence.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::JobQueueError;
use crate::events::JobEvent;
use crate::store::{JobStore, MemoryStore, PersistedQueue, StoreSnapshot};
use crate::types::{EnqueueOptions, Job, JobData, JobStatus, QueueStats, QueueStatus};
use crate::worker::QueueWorker;

/// Shortest pause between two idle scans.
const MIN_IDLE_WAIT: Duration = Duration::from_millis(10);

/// Capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 256;

/// Engine-wide defaults and timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Attempts allowed per job when the enqueue options do not say otherwise.
    pub max_retries: u32,
    /// Base of the linear retry backoff (`retry_delay * attempts`).
    pub retry_delay: Duration,
    /// Upper bound on how long an idle processing loop sleeps between scans.
    pub idle_interval: Duration,
    /// Per-job execution limit. Expiry counts as a retryable failure.
    pub job_timeout: Duration,
    /// Start the processing loop on enqueue when it is not running.
    pub auto_start: bool,
    /// Finished jobs kept per queue for inspection.
    pub history_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            idle_interval: Duration::from_secs(1),
            job_timeout: Duration::from_secs(300),
            auto_start: true,
            history_limit: 500,
        }
    }
}

/// In-memory state of one named queue.
#[derive(Debug, Default)]
struct QueueState {
    /// Jobs waiting for dispatch, highest priority first.
    jobs: VecDeque<Job>,
    /// The job currently handed to the worker.
    in_flight: Option<Job>,
    /// Finished jobs, oldest first.
    history: VecDeque<Job>,
    /// Set while a drain owns this queue.
    processing: bool,
    stats: QueueStats,
}

impl QueueState {
    /// Insert before the first job of strictly lower priority.
    fn insert(&mut self, job: Job) {
        match self.jobs.iter().position(|j| j.priority < job.priority) {
            Some(idx) => self.jobs.insert(idx, job),
            None => self.jobs.push_back(job),
        }
    }

    /// Remove the first job that may run at `now`. Retrying jobs whose
    /// backoff has elapsed go back to `pending` first.
    fn take_eligible(&mut self, now: DateTime<Utc>) -> Option<Job> {
        for job in self.jobs.iter_mut() {
            job.release_if_due(now);
        }
        let idx = self.jobs.iter().position(|j| j.is_eligible(now))?;
        self.jobs.remove(idx)
    }

    fn next_eligible_at(&self) -> Option<DateTime<Utc>> {
        self.jobs.iter().map(Job::eligible_at).min()
    }

    fn archive(&mut self, job: Job, limit: usize) {
        self.history.push_back(job);
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }

    fn to_persisted(&self) -> PersistedQueue {
        PersistedQueue {
            jobs: self.jobs.iter().cloned().collect(),
            in_flight: self.in_flight.clone(),
            history: self.history.iter().cloned().collect(),
            stats: self.stats,
        }
    }

    fn restore(&mut self, persisted: PersistedQueue) {
        let mut jobs: VecDeque<Job> = persisted.jobs.into();
        if let Some(mut job) = persisted.in_flight {
            job.status = JobStatus::Pending;
            job.started_at = None;
            jobs.push_front(job);
        }
        self.jobs = jobs;
        self.history = persisted.history.into();
        self.stats = persisted.stats;
    }
}

struct Runner {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct EngineInner {
    config: QueueConfig,
    queues: Mutex<BTreeMap<String, QueueState>>,
    workers: RwLock<HashMap<String, Arc<dyn QueueWorker>>>,
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<JobEvent>,
    wake: Notify,
    save_lock: tokio::sync::Mutex<()>,
    runner: tokio::sync::Mutex<Option<Runner>>,
}

/// Builder for [`QueueEngine`].
pub struct QueueEngineBuilder {
    config: QueueConfig,
    queues: Vec<String>,
    store: Option<Arc<dyn JobStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl QueueEngineBuilder {
    /// Queues created at construction time.
    #[must_use]
    pub fn queues<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queues.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> QueueEngine {
        let queues = self
            .queues
            .into_iter()
            .map(|name| (name, QueueState::default()))
            .collect();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        QueueEngine {
            inner: Arc::new(EngineInner {
                config: self.config,
                queues: Mutex::new(queues),
                workers: RwLock::new(HashMap::new()),
                store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                events,
                wake: Notify::new(),
                save_lock: tokio::sync::Mutex::new(()),
                runner: tokio::sync::Mutex::new(None),
            }),
        }
    }
}

/// Handle to the queue engine. Cloning is cheap; all clones share state.
#[derive(Clone)]
pub struct QueueEngine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for QueueEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueEngine")
            .field("config", &self.inner.config)
            .field("queues", &"<Mutex<BTreeMap<String, QueueState>>>")
            .field("workers", &"<RwLock<HashMap<String, Arc<dyn QueueWorker>>>>")
            .finish()
    }
}

/// Clears a queue's `processing` flag when a drain ends, however it ends.
struct DrainGuard<'a> {
    engine: &'a QueueEngine,
    queue: &'a str,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let mut queues = self.engine.lock_queues();
        if let Some(state) = queues.get_mut(self.queue) {
            state.processing = false;
            if let Some(mut job) = state.in_flight.take() {
                job.status = JobStatus::Pending;
                state.jobs.push_front(job);
            }
        }
    }
}

/// Aborts the worker task if the drain awaiting it is dropped.
struct WorkerTask(JoinHandle<Result<(), JobQueueError>>);

impl Drop for WorkerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl QueueEngine {
    pub fn builder(config: QueueConfig) -> QueueEngineBuilder {
        QueueEngineBuilder {
            config,
            queues: Vec::new(),
            store: None,
            clock: None,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    fn lock_queues(&self) -> MutexGuard<'_, BTreeMap<String, QueueState>> {
        self.inner
            .queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Add an empty queue. Returns false if the name is already taken.
    pub fn create_queue(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        let mut queues = self.lock_queues();
        if queues.contains_key(&name) {
            return false;
        }
        debug!(queue = %name, "queue created");
        queues.insert(name, QueueState::default());
        true
    }

    pub fn queue_names(&self) -> Vec<String> {
        self.lock_queues().keys().cloned().collect()
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.lock_queues().contains_key(name)
    }

    /// Register the worker for `worker.queue()`.
    ///
    /// A queue has at most one worker; a second registration is rejected.
    /// Use [`QueueEngine::replace_worker`] to swap deliberately.
    pub async fn register_worker(&self, worker: Arc<dyn QueueWorker>) -> Result<(), JobQueueError> {
        let queue = worker.queue().to_owned();
        if !self.has_queue(&queue) {
            return Err(JobQueueError::UnknownQueue(queue));
        }
        let mut workers = self.inner.workers.write().await;
        if workers.contains_key(&queue) {
            return Err(JobQueueError::WorkerAlreadyRegistered(queue));
        }
        info!(queue = %queue, "worker registered");
        workers.insert(queue, worker);
        drop(workers);
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Install `worker`, returning the one it replaces.
    pub async fn replace_worker(
        &self,
        worker: Arc<dyn QueueWorker>,
    ) -> Result<Option<Arc<dyn QueueWorker>>, JobQueueError> {
        let queue = worker.queue().to_owned();
        if !self.has_queue(&queue) {
            return Err(JobQueueError::UnknownQueue(queue));
        }
        let previous = self.inner.workers.write().await.insert(queue.clone(), worker);
        info!(queue = %queue, replaced = previous.is_some(), "worker installed");
        self.inner.wake.notify_one();
        Ok(previous)
    }

    pub async fn has_worker(&self, queue: &str) -> bool {
        self.inner.workers.read().await.contains_key(queue)
    }

    pub async fn worker_count(&self) -> usize {
        self.inner.workers.read().await.len()
    }

    async fn worker_for(&self, queue: &str) -> Option<Arc<dyn QueueWorker>> {
        self.inner.workers.read().await.get(queue).cloned()
    }

    /// Enqueue a job and return its id.
    pub async fn enqueue(
        &self,
        queue: &str,
        data: JobData,
        options: EnqueueOptions,
    ) -> Result<String, JobQueueError> {
        if data.job_type.trim().is_empty() {
            return Err(JobQueueError::InvalidOptions(
                "job type must not be empty".into(),
            ));
        }
        if options.max_retries == Some(0) {
            return Err(JobQueueError::InvalidOptions(
                "maxRetries must be at least 1".into(),
            ));
        }

        let job = Job::new(
            queue,
            data,
            options.priority,
            options.max_retries.unwrap_or(self.inner.config.max_retries),
            options.delay.unwrap_or_default(),
            self.inner.clock.now(),
        );
        let job_id = job.id.clone();
        let priority = job.priority;

        {
            let mut queues = self.lock_queues();
            let state = queues
                .get_mut(queue)
                .ok_or_else(|| JobQueueError::UnknownQueue(queue.to_owned()))?;
            state.insert(job);
            state.stats.total += 1;
        }

        info!(queue, job_id = %job_id, priority, "job enqueued");
        self.emit(JobEvent::Added {
            queue: queue.to_owned(),
            job_id: job_id.clone(),
        });
        self.persist().await;
        self.inner.wake.notify_one();

        if self.inner.config.auto_start {
            self.start_processing().await;
        }

        Ok(job_id)
    }

    /// Start the processing loop. Returns false if it was already running.
    pub async fn start_processing(&self) -> bool {
        let mut runner = self.inner.runner.lock().await;
        if let Some(existing) = runner.as_ref() {
            if !existing.handle.is_finished() {
                return false;
            }
        }

        let cancel = CancellationToken::new();
        let engine = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { engine.run(token).await });
        *runner = Some(Runner { cancel, handle });
        info!("queue processing started");
        true
    }

    /// Stop the processing loop, letting an in-flight job finish first.
    pub async fn stop_processing(&self) {
        let runner = self.inner.runner.lock().await.take();
        if let Some(runner) = runner {
            runner.cancel.cancel();
            if let Err(e) = runner.handle.await {
                warn!(error = %e, "queue processing loop ended abnormally");
            }
            info!("queue processing stopped");
        }
    }

    /// Restart the processing loop if it is not running.
    pub async fn ensure_processing(&self) -> bool {
        let started = self.start_processing().await;
        if started {
            warn!("queue processing loop was not running; restarted");
        }
        started
    }

    pub async fn is_processing(&self) -> bool {
        self.inner
            .runner
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    async fn run(self, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            let mut dispatched = 0usize;
            for queue in self.queue_names() {
                if cancel.is_cancelled() {
                    break;
                }
                match self.spawn_drain(&queue, Some(cancel.clone())).await {
                    Ok(n) => dispatched += n,
                    Err(e) => warn!(queue = %queue, error = %e, "drain failed"),
                }
            }
            if dispatched > 0 {
                continue;
            }

            let wait = self.idle_wait().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.inner.wake.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
        debug!("queue processing loop exited");
    }

    /// How long an idle loop may sleep before a delayed job becomes due.
    async fn idle_wait(&self) -> Duration {
        let idle = self.inner.config.idle_interval;
        let now = self.inner.clock.now();
        let workers = self.inner.workers.read().await;
        let next = {
            let queues = self.lock_queues();
            queues
                .iter()
                .filter(|(name, state)| !state.processing && workers.contains_key(*name))
                .filter_map(|(_, state)| state.next_eligible_at())
                .min()
        };
        match next {
            Some(at) => (at - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .clamp(MIN_IDLE_WAIT, idle.max(MIN_IDLE_WAIT)),
            None => idle,
        }
    }

    /// Drain one queue: dispatch eligible jobs until none is left.
    ///
    /// Returns the number of jobs dispatched. If another drain already owns
    /// the queue, or no worker is registered for it, this is a no-op.
    ///
    /// The drain runs on its own task: dropping the returned future does not
    /// interrupt a job in flight, and the queue stays owned until it settles.
    pub async fn drain_queue(&self, queue: &str) -> Result<usize, JobQueueError> {
        self.spawn_drain(queue, None).await
    }

    async fn spawn_drain(
        &self,
        queue: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<usize, JobQueueError> {
        let engine = self.clone();
        let name = queue.to_owned();
        let handle = tokio::spawn(async move { engine.drain(&name, cancel.as_ref()).await });
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(JobQueueError::failed(format!("drain of {queue} aborted: {e}"))),
        }
    }

    async fn drain(
        &self,
        queue: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<usize, JobQueueError> {
        let Some(worker) = self.worker_for(queue).await else {
            if !self.has_queue(queue) {
                return Err(JobQueueError::UnknownQueue(queue.to_owned()));
            }
            return Ok(0);
        };

        {
            let mut queues = self.lock_queues();
            let state = queues
                .get_mut(queue)
                .ok_or_else(|| JobQueueError::UnknownQueue(queue.to_owned()))?;
            if state.processing {
                debug!(queue, "queue already draining");
                return Ok(0);
            }
            state.processing = true;
        }
        let _guard = DrainGuard {
            engine: self,
            queue,
        };

        let mut dispatched = 0usize;
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                break;
            }

            let job = {
                let now = self.inner.clock.now();
                let mut queues = self.lock_queues();
                let Some(state) = queues.get_mut(queue) else {
                    break;
                };
                let Some(mut job) = state.take_eligible(now) else {
                    break;
                };
                job.start(now);
                state.in_flight = Some(job.clone());
                job
            };

            debug!(queue, job_id = %job.id, attempt = job.attempts + 1, "dispatching job");
            self.emit(JobEvent::Started {
                queue: queue.to_owned(),
                job_id: job.id.clone(),
                attempt: job.attempts + 1,
            });

            let outcome = self.execute(Arc::clone(&worker), job.data.clone()).await;
            self.finish(queue, job, outcome);
            dispatched += 1;
            self.persist().await;
        }

        Ok(dispatched)
    }

    /// Run the worker on its own task so panics and timeouts stay contained.
    async fn execute(
        &self,
        worker: Arc<dyn QueueWorker>,
        data: JobData,
    ) -> Result<(), JobQueueError> {
        let timeout = self.inner.config.job_timeout;
        let mut task = WorkerTask(tokio::spawn(async move { worker.execute(data).await }));
        match tokio::time::timeout(timeout, &mut task.0).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_panic() => Err(JobQueueError::failed(format!(
                "worker panicked: {}",
                panic_message(join_err)
            ))),
            Ok(Err(join_err)) => Err(JobQueueError::failed(format!(
                "worker task aborted: {join_err}"
            ))),
            Err(_) => Err(JobQueueError::Timeout(timeout)),
        }
    }

    fn finish(&self, queue: &str, mut job: Job, outcome: Result<(), JobQueueError>) {
        let now = self.inner.clock.now();
        let history_limit = self.inner.config.history_limit;
        let mut queues = self.lock_queues();
        let Some(state) = queues.get_mut(queue) else {
            return;
        };
        state.in_flight = None;

        let event = match outcome {
            Ok(()) => {
                job.complete(now);
                state.stats.completed += 1;
                info!(queue, job_id = %job.id, "job completed");
                let event = JobEvent::Completed {
                    queue: queue.to_owned(),
                    job_id: job.id.clone(),
                };
                state.archive(job, history_limit);
                event
            }
            Err(err) => {
                let message = err.to_string();
                let retry_allowed = job.record_failure(message.clone(), now);
                if retry_allowed && err.is_retryable() {
                    let delay = self
                        .inner
                        .config
                        .retry_delay
                        .checked_mul(job.attempts)
                        .unwrap_or(Duration::MAX);
                    job.retry_after(delay);
                    state.stats.retries += 1;
                    warn!(
                        queue,
                        job_id = %job.id,
                        attempt = job.attempts,
                        max_attempts = job.max_attempts,
                        delay_ms = job.delay_ms,
                        error = %message,
                        "job failed; retrying"
                    );
                    let event = JobEvent::Retrying {
                        queue: queue.to_owned(),
                        job_id: job.id.clone(),
                        attempt: job.attempts,
                        delay_ms: job.delay_ms,
                        error: message,
                    };
                    state.jobs.push_back(job);
                    event
                } else {
                    job.fail(now);
                    state.stats.failed += 1;
                    error!(
                        queue,
                        job_id = %job.id,
                        attempts = job.attempts,
                        retryable = err.is_retryable(),
                        error = %message,
                        "job failed permanently"
                    );
                    let event = JobEvent::Failed {
                        queue: queue.to_owned(),
                        job_id: job.id.clone(),
                        error: message,
                    };
                    state.archive(job, history_limit);
                    event
                }
            }
        };
        drop(queues);
        self.emit(event);
    }

    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    pub async fn queue_stats(&self, queue: &str) -> Result<QueueStatus, JobQueueError> {
        let has_worker = self.has_worker(queue).await;
        let queues = self.lock_queues();
        let state = queues
            .get(queue)
            .ok_or_else(|| JobQueueError::UnknownQueue(queue.to_owned()))?;
        Ok(status_of(queue, state, has_worker))
    }

    pub async fn all_queue_stats(&self) -> BTreeMap<String, QueueStatus> {
        let workers = self.inner.workers.read().await;
        let queues = self.lock_queues();
        queues
            .iter()
            .map(|(name, state)| {
                (
                    name.clone(),
                    status_of(name, state, workers.contains_key(name)),
                )
            })
            .collect()
    }

    /// Pending jobs of a queue in dispatch order.
    pub fn pending_jobs(&self, queue: &str) -> Result<Vec<Job>, JobQueueError> {
        let queues = self.lock_queues();
        let state = queues
            .get(queue)
            .ok_or_else(|| JobQueueError::UnknownQueue(queue.to_owned()))?;
        Ok(state.jobs.iter().cloned().collect())
    }

    /// Look a job up by id among pending, in-flight and finished jobs.
    pub fn get_job(&self, id: &str) -> Option<Job> {
        let queues = self.lock_queues();
        queues.values().find_map(|state| {
            state
                .jobs
                .iter()
                .chain(state.in_flight.iter())
                .chain(state.history.iter())
                .find(|j| j.id == id)
                .cloned()
        })
    }

    /// Drop every pending job and the finished-job history of a queue.
    ///
    /// Returns the number of pending jobs removed. Stats are kept.
    pub async fn clear_queue(&self, queue: &str) -> Result<usize, JobQueueError> {
        let cleared = {
            let mut queues = self.lock_queues();
            let state = queues
                .get_mut(queue)
                .ok_or_else(|| JobQueueError::UnknownQueue(queue.to_owned()))?;
            let cleared = state.jobs.len();
            state.jobs.clear();
            state.history.clear();
            cleared
        };
        info!(queue, cleared, "queue cleared");
        self.persist().await;
        Ok(cleared)
    }

    fn snapshot(&self) -> StoreSnapshot {
        let queues = self.lock_queues();
        StoreSnapshot {
            saved_at: self.inner.clock.now(),
            queues: queues
                .iter()
                .map(|(name, state)| (name.clone(), state.to_persisted()))
                .collect(),
        }
    }

    /// Write the current state to the store. Failures are logged, not raised.
    pub async fn persist(&self) {
        let _serialized = self.inner.save_lock.lock().await;
        let snapshot = self.snapshot();
        if let Err(e) = self.inner.store.save(&snapshot).await {
            error!(error = %e, "failed to persist queue state");
        }
    }

    /// Merge the stored snapshot into the known queues.
    ///
    /// Returns the number of pending jobs restored. Errors are logged and
    /// leave the in-memory state untouched.
    pub async fn load_state(&self) -> usize {
        let snapshot = match self.inner.store.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("no persisted queue state found");
                return 0;
            }
            Err(e) => {
                error!(error = %e, "failed to load persisted queue state; starting empty");
                return 0;
            }
        };

        let mut restored = 0usize;
        {
            let mut queues = self.lock_queues();
            for (name, persisted) in snapshot.queues {
                match queues.get_mut(&name) {
                    Some(state) => {
                        state.restore(persisted);
                        restored += state.jobs.len();
                    }
                    None => warn!(queue = %name, "ignoring persisted state for unknown queue"),
                }
            }
        }
        info!(restored, saved_at = %snapshot.saved_at, "queue state loaded");
        self.inner.wake.notify_one();
        restored
    }
}

fn status_of(name: &str, state: &QueueState, has_worker: bool) -> QueueStatus {
    QueueStatus {
        name: name.to_owned(),
        pending: state.jobs.len(),
        processing: state.processing,
        has_worker,
        stats: state.stats,
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(priority: i32) -> Job {
        Job::new(
            "q",
            JobData::new("t", json!({ "p": priority })),
            priority,
            3,
            Duration::ZERO,
            Utc::now(),
        )
    }

    #[test]
    fn insert_orders_by_priority_then_fifo() {
        let mut state = QueueState::default();
        let a = job(1);
        let b = job(5);
        let c = job(3);
        let d = job(5);
        let ids = [b.id.clone(), d.id.clone(), c.id.clone(), a.id.clone()];
        for j in [a, b, c, d] {
            state.insert(j);
        }
        let order: Vec<_> = state.jobs.iter().map(|j| j.id.clone()).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn history_is_bounded() {
        let mut state = QueueState::default();
        for _ in 0..5 {
            state.archive(job(0), 3);
        }
        assert_eq!(state.history.len(), 3);
    }

    #[test]
    fn take_eligible_releases_due_retries() {
        let now = Utc::now();
        let mut due = job(0);
        assert!(due.record_failure("boom", now - chrono::Duration::seconds(10)));
        due.retry_after(Duration::from_secs(5));
        let mut waiting = job(0);
        assert!(waiting.record_failure("boom", now));
        waiting.retry_after(Duration::from_secs(60));
        let ready = job(0);

        let mut state = QueueState::default();
        state.jobs.extend([ready.clone(), due.clone(), waiting.clone()]);

        assert_eq!(state.take_eligible(now).map(|j| j.id), Some(ready.id));
        assert_eq!(state.jobs[0].id, due.id);
        assert_eq!(state.jobs[0].status, JobStatus::Pending);
        assert_eq!(state.jobs[1].status, JobStatus::Retrying);
    }

    #[test]
    fn restore_requeues_in_flight_job_at_head() {
        let mut in_flight = job(0);
        in_flight.start(Utc::now());
        let waiting = job(9);
        let persisted = PersistedQueue {
            jobs: vec![waiting.clone()],
            in_flight: Some(in_flight.clone()),
            history: Vec::new(),
            stats: QueueStats {
                total: 2,
                ..QueueStats::default()
            },
        };

        let mut state = QueueState::default();
        state.restore(persisted);
        assert_eq!(state.jobs.len(), 2);
        assert_eq!(state.jobs[0].id, in_flight.id);
        assert_eq!(state.jobs[0].status, JobStatus::Pending);
        assert_eq!(state.jobs[1].id, waiting.id);
        assert_eq!(state.stats.total, 2);
    }
}
