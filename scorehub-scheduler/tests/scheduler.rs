use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scorehub_job_queue::{EnqueueOptions, JobData, QueueConfig, QueueEngine};
use scorehub_scheduler::{Scheduler, SchedulerError, TaskAction, TaskError};
use serde_json::json;

const EVERY_SECOND: &str = "* * * * * *";

fn counting_action(counter: &Arc<AtomicU32>) -> TaskAction {
    let counter = Arc::clone(counter);
    TaskAction::inline(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), TaskError>(())
        }
    })
}

#[tokio::test]
async fn define_rejects_duplicates_and_bad_input() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(AtomicU32::new(0));

    scheduler
        .define_task("nightly", "0 2 * * *", "UTC", counting_action(&counter))
        .unwrap();
    assert!(matches!(
        scheduler.define_task("nightly", "0 3 * * *", "UTC", counting_action(&counter)),
        Err(SchedulerError::DuplicateTask(_))
    ));
    assert!(matches!(
        scheduler.define_task("bad", "banana * * * *", "UTC", counting_action(&counter)),
        Err(SchedulerError::InvalidCron { .. })
    ));
    assert!(matches!(
        scheduler.define_task("tz", "0 2 * * *", "Nowhere/Special", counting_action(&counter)),
        Err(SchedulerError::InvalidTimezone(_))
    ));
    assert_eq!(scheduler.task_count(), 1);

    let status = scheduler.get_status();
    assert_eq!(status[0].name, "nightly");
    assert!(!status[0].active);
    assert!(status[0].next_run.is_none());
}

#[tokio::test]
async fn stop_is_idempotent_and_safe_before_start() {
    let scheduler = Scheduler::new();
    scheduler.stop().await;
    scheduler.stop().await;
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn tasks_fire_until_stopped_and_resume_after_start() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(AtomicU32::new(0));
    scheduler
        .define_task("tick", EVERY_SECOND, "UTC", counting_action(&counter))
        .unwrap();

    assert_eq!(scheduler.start().await, 1);
    assert_eq!(scheduler.start().await, 0);
    let status = scheduler.get_status();
    assert!(status[0].active);

    tokio::time::sleep(Duration::from_millis(2_300)).await;
    assert!(counter.load(Ordering::SeqCst) >= 1);
    assert!(scheduler.get_status()[0].next_run.is_some());

    scheduler.stop().await;
    assert!(!scheduler.get_status()[0].active);
    let after_stop = counter.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1_300)).await;
    assert_eq!(counter.load(Ordering::SeqCst), after_stop);

    assert_eq!(scheduler.start().await, 1);
    tokio::time::sleep(Duration::from_millis(1_300)).await;
    assert!(counter.load(Ordering::SeqCst) > after_stop);
    scheduler.stop().await;
}

#[tokio::test]
async fn failing_action_stays_armed() {
    let scheduler = Scheduler::new();
    let attempts = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&attempts);
    scheduler
        .define_task(
            "flaky",
            EVERY_SECOND,
            "UTC",
            TaskAction::inline(move || {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(TaskError::failed("health endpoint unreachable"))
                }
            }),
        )
        .unwrap();

    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    scheduler.stop().await;

    assert!(attempts.load(Ordering::SeqCst) >= 2);
    let status = &scheduler.get_status()[0];
    assert_eq!(status.failures, status.runs);
    assert_eq!(
        status.last_error.as_deref(),
        Some("health endpoint unreachable")
    );
}

#[tokio::test]
async fn trigger_runs_action_immediately() {
    let scheduler = Scheduler::new();
    let counter = Arc::new(AtomicU32::new(0));
    scheduler
        .define_task("yearly", "0 0 1 1 *", "UTC", counting_action(&counter))
        .unwrap();

    scheduler.trigger("yearly").await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.get_status()[0].runs, 1);
    assert!(matches!(
        scheduler.trigger("missing").await,
        Err(SchedulerError::UnknownTask(_))
    ));
}

#[tokio::test]
async fn enqueue_action_defers_to_queue_engine() {
    let engine = QueueEngine::builder(QueueConfig {
        auto_start: false,
        ..QueueConfig::default()
    })
    .queues(["reports"])
    .build();

    let scheduler = Scheduler::new();
    scheduler
        .define_task(
            "weekly-report",
            "0 9 * * 1",
            "UTC",
            TaskAction::enqueue(
                engine.clone(),
                "reports",
                JobData::new("weekly", json!({})),
                EnqueueOptions::default().priority(2),
            ),
        )
        .unwrap();
    scheduler
        .define_task(
            "broken",
            "0 9 * * 1",
            "UTC",
            TaskAction::enqueue(
                engine.clone(),
                "no-such-queue",
                JobData::new("weekly", json!({})),
                EnqueueOptions::default(),
            ),
        )
        .unwrap();

    scheduler.trigger("weekly-report").await.unwrap();
    let pending = engine.pending_jobs("reports").unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].data.job_type, "weekly");
    assert_eq!(pending[0].priority, 2);

    let err = scheduler.trigger("broken").await.unwrap_err();
    assert!(err.to_string().contains("no-such-queue"));
}
