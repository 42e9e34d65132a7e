//! Lifecycle of the background system: engine, workers and scheduler.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use scorehub_config::{validate_config, Config};
use scorehub_job_queue::{JsonFileStore, QueueConfig, QueueEngine, QueueStatus};
use scorehub_jobs::{queues, register_all_workers, LogMailer, LogNotifier, Mailer, Notifier, WorkerContext};
use scorehub_scheduler::{Scheduler, TaskStatus};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::WorkflowError;
use crate::tasks::define_default_tasks;

/// External delivery backends handed to the workers.
#[derive(Clone)]
pub struct Collaborators {
    pub mailer: Arc<dyn Mailer>,
    pub notifier: Arc<dyn Notifier>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            mailer: Arc::new(LogMailer),
            notifier: Arc::new(LogNotifier),
        }
    }
}

/// Serializable overview for admin endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub initialized: bool,
    pub timestamp: DateTime<Utc>,
    pub scheduler_running: bool,
    pub tasks: Vec<TaskStatus>,
    pub queues: BTreeMap<String, QueueStatus>,
}

struct Running {
    engine: QueueEngine,
    scheduler: Scheduler,
}

/// Owns the queue engine and scheduler for one process.
pub struct WorkflowOrchestrator {
    config: Config,
    collaborators: Collaborators,
    running: Mutex<Option<Running>>,
}

impl WorkflowOrchestrator {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bring the system up. A second call while initialized is a no-op.
    pub async fn initialize(&self) -> Result<(), WorkflowError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("workflow system already initialized");
            return Ok(());
        }
        validate_config(&self.config)?;
        info!("initializing workflow system");

        let store = JsonFileStore::new(self.config.queue.state_path());
        let engine = QueueEngine::builder(queue_config(&self.config))
            .queues(queues::DEFAULT_QUEUES)
            .store(Arc::new(store))
            .build();
        register_all_workers(&engine, &self.worker_context()).await?;

        let restored = engine.load_state().await;
        if restored > 0 {
            info!(restored, "pending jobs restored from disk");
        }

        let scheduler = Scheduler::new();
        define_default_tasks(
            &scheduler,
            &engine,
            &self.config.scheduler.timezone,
            self.config.scheduler.memory_alert_mb,
        )?;
        if self.config.scheduler.enabled {
            scheduler.start().await;
        } else {
            info!("scheduler disabled by configuration");
        }
        engine.start_processing().await;

        info!(
            queues = queues::DEFAULT_QUEUES.len(),
            tasks = scheduler.task_count(),
            "workflow system initialized"
        );
        *running = Some(Running { engine, scheduler });
        Ok(())
    }

    /// Stop the scheduler, then the engine, then write a final snapshot.
    /// Safe to call when never initialized.
    pub async fn shutdown(&self) {
        let Some(running) = self.running.lock().await.take() else {
            debug!("workflow system not running; nothing to shut down");
            return;
        };
        info!("shutting down workflow system");
        running.scheduler.stop().await;
        running.engine.stop_processing().await;
        running.engine.persist().await;
        info!("workflow system shut down");
    }

    pub async fn restart(&self) -> Result<(), WorkflowError> {
        self.shutdown().await;
        self.initialize().await
    }

    pub async fn is_initialized(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Handle to the queue engine for enqueueing work.
    pub async fn engine(&self) -> Result<QueueEngine, WorkflowError> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|r| r.engine.clone())
            .ok_or(WorkflowError::NotInitialized)
    }

    /// Run a scheduled task now.
    pub async fn trigger_task(&self, name: &str) -> Result<(), WorkflowError> {
        let running = self.running.lock().await;
        let running = running.as_ref().ok_or(WorkflowError::NotInitialized)?;
        running.scheduler.trigger(name).await?;
        Ok(())
    }

    pub async fn get_system_status(&self) -> SystemStatus {
        let running = self.running.lock().await;
        match running.as_ref() {
            Some(r) => SystemStatus {
                initialized: true,
                timestamp: Utc::now(),
                scheduler_running: r.scheduler.is_running(),
                tasks: r.scheduler.get_status(),
                queues: r.engine.all_queue_stats().await,
            },
            None => SystemStatus {
                initialized: false,
                timestamp: Utc::now(),
                scheduler_running: false,
                tasks: Vec::new(),
                queues: BTreeMap::new(),
            },
        }
    }

    fn worker_context(&self) -> WorkerContext {
        let storage = &self.config.storage;
        WorkerContext {
            uploads_dir: PathBuf::from(&storage.uploads_dir),
            watermarked_dir: PathBuf::from(&storage.watermarked_dir),
            reports_dir: PathBuf::from(&storage.reports_dir),
            data_dir: PathBuf::from(&self.config.queue.data_dir),
            backup_dir: PathBuf::from(&storage.backup_dir),
            backup_keep: storage.backup_keep,
            temp_dirs: storage.temp_dirs.iter().map(PathBuf::from).collect(),
            cleanup_max_age: Duration::from_secs(
                storage.cleanup_max_age_hours.saturating_mul(60 * 60),
            ),
            site_url: self.config.site.base_url.clone(),
            public_dir: PathBuf::from(&self.config.site.public_dir),
            routes: self.config.site.routes.clone(),
            mailer: Arc::clone(&self.collaborators.mailer),
            notifier: Arc::clone(&self.collaborators.notifier),
        }
    }
}

/// Engine timing derived from the `queue` section.
pub fn queue_config(config: &Config) -> QueueConfig {
    let q = &config.queue;
    QueueConfig {
        max_retries: q.max_retries,
        retry_delay: Duration::from_millis(q.retry_delay_ms),
        idle_interval: Duration::from_millis(q.idle_interval_ms),
        job_timeout: Duration::from_secs(q.job_timeout_secs),
        auto_start: q.auto_start,
        history_limit: q.history_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_config_converts_units() {
        let mut config = Config::default();
        config.queue.retry_delay_ms = 1_500;
        config.queue.job_timeout_secs = 30;
        let qc = queue_config(&config);
        assert_eq!(qc.retry_delay, Duration::from_millis(1_500));
        assert_eq!(qc.job_timeout, Duration::from_secs(30));
        assert_eq!(qc.max_retries, 3);
        assert_eq!(qc.history_limit, 500);
    }

    #[test]
    fn cleanup_age_saturates() {
        let mut config = Config::default();
        config.storage.cleanup_max_age_hours = 48;
        let orchestrator = WorkflowOrchestrator::new(config.clone(), Collaborators::default());
        assert_eq!(
            orchestrator.worker_context().cleanup_max_age,
            Duration::from_secs(48 * 3600)
        );

        config.storage.cleanup_max_age_hours = u64::MAX;
        let orchestrator = WorkflowOrchestrator::new(config, Collaborators::default());
        assert_eq!(
            orchestrator.worker_context().cleanup_max_age,
            Duration::from_secs(u64::MAX)
        );
    }
}
