//! Recurring tasks defined at startup.

use scorehub_job_queue::{EnqueueOptions, JobData, QueueEngine};
use scorehub_jobs::{job_types, queues};
use scorehub_scheduler::{Scheduler, SchedulerError, TaskAction, TaskError};
use serde_json::json;
use tracing::{debug, warn};

use crate::memory::resident_memory_mb;

/// A recurring task that enqueues one job per fire.
struct EnqueueTask {
    name: &'static str,
    expression: &'static str,
    queue: &'static str,
    job_type: &'static str,
    priority: i32,
}

const ENQUEUE_TASKS: &[EnqueueTask] = &[
    EnqueueTask {
        name: "database-backup",
        expression: "0 1 * * *",
        queue: queues::BACKUP,
        job_type: job_types::DATABASE_BACKUP,
        priority: 10,
    },
    EnqueueTask {
        name: "seo-regeneration",
        expression: "0 2 * * *",
        queue: queues::SEO,
        job_type: job_types::GENERATE_SITEMAP,
        priority: 0,
    },
    EnqueueTask {
        name: "file-cleanup",
        expression: "0 3 * * *",
        queue: queues::CLEANUP,
        job_type: job_types::FILE_CLEANUP,
        priority: 0,
    },
    EnqueueTask {
        name: "seo-health-check",
        expression: "0 */6 * * *",
        queue: queues::SEO,
        job_type: job_types::SEO_HEALTH_CHECK,
        priority: 0,
    },
    EnqueueTask {
        name: "campaign-sweep",
        expression: "0 * * * *",
        queue: queues::NOTIFICATIONS,
        job_type: job_types::CAMPAIGN_SWEEP,
        priority: 5,
    },
    EnqueueTask {
        name: "weekly-report",
        expression: "0 9 * * 1",
        queue: queues::REPORTS,
        job_type: job_types::WEEKLY_REPORT,
        priority: 0,
    },
    EnqueueTask {
        name: "monthly-report",
        expression: "0 9 1 * *",
        queue: queues::REPORTS,
        job_type: job_types::MONTHLY_REPORT,
        priority: 0,
    },
];

pub const QUEUE_SELF_HEAL: &str = "queue-self-heal";
pub const MEMORY_HEALTH: &str = "memory-health";

/// Names of every task [`define_default_tasks`] registers, in definition order.
pub fn default_task_names() -> Vec<&'static str> {
    ENQUEUE_TASKS
        .iter()
        .map(|t| t.name)
        .chain([QUEUE_SELF_HEAL, MEMORY_HEALTH])
        .collect()
}

/// Define the standard recurring tasks on `scheduler`.
pub fn define_default_tasks(
    scheduler: &Scheduler,
    engine: &QueueEngine,
    timezone: &str,
    memory_alert_mb: u64,
) -> Result<(), SchedulerError> {
    for task in ENQUEUE_TASKS {
        scheduler.define_task(
            task.name,
            task.expression,
            timezone,
            TaskAction::enqueue(
                engine.clone(),
                task.queue,
                JobData::new(task.job_type, json!({ "triggered_by": task.name })),
                EnqueueOptions::default().priority(task.priority),
            ),
        )?;
    }

    let heal = engine.clone();
    scheduler.define_task(
        QUEUE_SELF_HEAL,
        "*/5 * * * *",
        timezone,
        TaskAction::inline(move || {
            let engine = heal.clone();
            async move {
                if !engine.ensure_processing().await {
                    debug!("queue processing loop healthy");
                }
                Ok::<(), TaskError>(())
            }
        }),
    )?;

    scheduler.define_task(
        MEMORY_HEALTH,
        "*/15 * * * *",
        timezone,
        TaskAction::inline(move || async move {
            let usage = tokio::task::spawn_blocking(resident_memory_mb)
                .await
                .map_err(|e| TaskError::failed(e.to_string()))?
                .ok_or_else(|| TaskError::failed("process memory unavailable"))?;
            if usage > memory_alert_mb {
                warn!(
                    memory_mb = usage,
                    threshold_mb = memory_alert_mb,
                    "memory usage above alert threshold"
                );
            } else {
                debug!(memory_mb = usage, "memory usage nominal");
            }
            Ok::<(), TaskError>(())
        }),
    )?;

    Ok(())
}
