//! Scheduler driving every defined task on its own timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::action::TaskAction;
use crate::error::SchedulerError;
use crate::schedule::TaskSchedule;

/// Reported state of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub name: String,
    pub expression: String,
    pub timezone: String,
    pub action: String,
    pub active: bool,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub runs: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct TaskState {
    active: bool,
    next_run: Option<DateTime<Utc>>,
    last_run: Option<DateTime<Utc>>,
    runs: u64,
    failures: u64,
    last_error: Option<String>,
}

#[derive(Debug)]
struct TaskEntry {
    name: String,
    schedule: TaskSchedule,
    action: TaskAction,
    state: Mutex<TaskState>,
}

impl TaskEntry {
    fn state(&self) -> std::sync::MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn status(&self) -> TaskStatus {
        let state = self.state();
        TaskStatus {
            name: self.name.clone(),
            expression: self.schedule.expression().to_owned(),
            timezone: self.schedule.timezone().to_owned(),
            action: self.action.kind().to_owned(),
            active: state.active,
            next_run: state.next_run,
            last_run: state.last_run,
            runs: state.runs,
            failures: state.failures,
            last_error: state.last_error.clone(),
        }
    }

    /// Invoke the action once and record the outcome.
    async fn fire(&self) -> Result<(), String> {
        let fired_at = Utc::now();
        debug!(task = %self.name, "scheduled task firing");

        // A panicking action only takes down its own task.
        let outcome = match tokio::spawn(self.action.invoke()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) if e.is_panic() => Err("task action panicked".to_string()),
            Err(e) => Err(e.to_string()),
        };

        let mut state = self.state();
        state.runs += 1;
        state.last_run = Some(fired_at);
        match &outcome {
            Ok(()) => {
                state.last_error = None;
                debug!(task = %self.name, "scheduled task finished");
            }
            Err(message) => {
                state.failures += 1;
                state.last_error = Some(message.clone());
                error!(task = %self.name, error = %message, "scheduled task failed");
            }
        }
        outcome
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        self.state().active = true;
        let mut cursor = Utc::now();
        loop {
            let Some(next) = self.schedule.next_after(cursor.max(Utc::now())) else {
                warn!(task = %self.name, "schedule has no upcoming fire time");
                break;
            };
            self.state().next_run = Some(next);

            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            // Failures are recorded and logged; the task stays armed.
            let _ = self.fire().await;
            cursor = next;
        }
        let mut state = self.state();
        state.active = false;
        state.next_run = None;
    }
}

struct Running {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Holds named cron tasks and runs their timers.
///
/// Definitions outlive `stop`; a later `start` re-arms the same set.
pub struct Scheduler {
    tasks: RwLock<Vec<Arc<TaskEntry>>>,
    running: tokio::sync::Mutex<Option<Running>>,
    started: AtomicBool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.task_count())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            running: tokio::sync::Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    fn tasks(&self) -> Vec<Arc<TaskEntry>> {
        self.tasks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Define a task. Its timer starts with the next [`Scheduler::start`].
    pub fn define_task(
        &self,
        name: impl Into<String>,
        expression: &str,
        timezone: &str,
        action: TaskAction,
    ) -> Result<(), SchedulerError> {
        let name = name.into();
        let schedule = TaskSchedule::parse(expression, timezone)?;

        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        if tasks.iter().any(|t| t.name == name) {
            return Err(SchedulerError::DuplicateTask(name));
        }
        if self.is_running() {
            warn!(task = %name, "task defined while running; it is armed on the next start");
        }
        info!(task = %name, expression, timezone, "scheduled task defined");
        tasks.push(Arc::new(TaskEntry {
            name,
            schedule,
            action,
            state: Mutex::new(TaskState::default()),
        }));
        Ok(())
    }

    pub fn task_count(&self) -> usize {
        self.tasks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Arm every defined task. Returns the number of timers started, or 0 if
    /// the scheduler was already running.
    pub async fn start(&self) -> usize {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("scheduler already running");
            return 0;
        }

        let cancel = CancellationToken::new();
        let handles: Vec<_> = self
            .tasks()
            .into_iter()
            .map(|task| {
                task.state().active = true;
                tokio::spawn(task.run(cancel.child_token()))
            })
            .collect();
        let started = handles.len();
        *running = Some(Running { cancel, handles });
        self.started.store(true, Ordering::SeqCst);
        info!(tasks = started, "scheduler started");
        started
    }

    /// Disarm every task. Safe to call repeatedly or before `start`.
    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        self.started.store(false, Ordering::SeqCst);
        let Some(running) = running else {
            return;
        };
        running.cancel.cancel();
        for handle in running.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "scheduled task timer ended abnormally");
            }
        }
        for task in self.tasks() {
            let mut state = task.state();
            state.active = false;
            state.next_run = None;
        }
        info!("scheduler stopped");
    }

    /// Run a task's action now, outside its schedule.
    pub async fn trigger(&self, name: &str) -> Result<(), SchedulerError> {
        let task = self
            .tasks()
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SchedulerError::UnknownTask(name.to_owned()))?;
        info!(task = %name, "scheduled task triggered manually");
        task.fire()
            .await
            .map_err(|message| SchedulerError::ActionFailed {
                task: name.to_owned(),
                message,
            })
    }

    /// Status of every task in definition order.
    pub fn get_status(&self) -> Vec<TaskStatus> {
        self.tasks().iter().map(|t| t.status()).collect()
    }
}
