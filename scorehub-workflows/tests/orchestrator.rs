use std::path::Path;
use std::time::Duration;

use scorehub_config::Config;
use scorehub_job_queue::{EnqueueOptions, JobData};
use scorehub_jobs::queues;
use scorehub_workflows::{default_task_names, Collaborators, WorkflowError, WorkflowOrchestrator};
use serde_json::json;

fn config_in(root: &Path) -> Config {
    let mut config = Config::default();
    let dir = |name: &str| root.join(name).to_string_lossy().into_owned();
    config.queue.data_dir = dir("data");
    config.queue.retry_delay_ms = 50;
    config.queue.idle_interval_ms = 50;
    config.storage.uploads_dir = dir("uploads");
    config.storage.watermarked_dir = dir("uploads/watermarked");
    config.storage.reports_dir = dir("reports");
    config.storage.backup_dir = dir("backups");
    config.storage.temp_dirs = vec![dir("tmp")];
    config.site.public_dir = dir("public");
    config
}

fn orchestrator(root: &Path) -> WorkflowOrchestrator {
    WorkflowOrchestrator::new(config_in(root), Collaborators::default())
}

#[tokio::test]
async fn initialize_twice_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path());

    orch.initialize().await.unwrap();
    let first = orch.get_system_status().await;
    let engine = orch.engine().await.unwrap();
    let workers = engine.worker_count().await;

    orch.initialize().await.unwrap();
    let second = orch.get_system_status().await;

    assert!(second.initialized);
    assert!(second.scheduler_running);
    assert_eq!(first.tasks.len(), default_task_names().len());
    assert_eq!(second.tasks.len(), first.tasks.len());
    assert_eq!(workers, queues::DEFAULT_QUEUES.len());
    assert_eq!(orch.engine().await.unwrap().worker_count().await, workers);
    assert_eq!(second.queues.len(), queues::DEFAULT_QUEUES.len());
    assert!(second.queues.values().all(|q| q.has_worker));

    let names: Vec<_> = second.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, default_task_names());

    let as_json = serde_json::to_value(&second).unwrap();
    assert_eq!(as_json["initialized"], true);
    assert!(as_json["queues"]["pdf-processing"].is_object());

    orch.shutdown().await;
}

#[tokio::test]
async fn shutdown_without_initialize_is_safe() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path());

    orch.shutdown().await;
    orch.shutdown().await;

    assert!(matches!(orch.engine().await, Err(WorkflowError::NotInitialized)));
    let status = orch.get_system_status().await;
    assert!(!status.initialized);
    assert!(status.tasks.is_empty());
    assert!(status.queues.is_empty());
}

#[tokio::test]
async fn pending_jobs_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    let orch = orchestrator(dir.path());
    orch.initialize().await.unwrap();
    let id = orch
        .engine()
        .await
        .unwrap()
        .enqueue(
            queues::REPORTS,
            JobData::new("monthly-report", json!({"requested_by": "admin"})),
            EnqueueOptions::default().delay(Duration::from_secs(3600)),
        )
        .await
        .unwrap();
    orch.shutdown().await;
    assert!(!orch.is_initialized().await);
    assert!(dir.path().join("data/queue-state.json").exists());

    let revived = orchestrator(dir.path());
    revived.initialize().await.unwrap();
    let pending = revived
        .engine()
        .await
        .unwrap()
        .pending_jobs(queues::REPORTS)
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);

    revived.restart().await.unwrap();
    assert!(revived.is_initialized().await);
    let status = revived.get_system_status().await;
    assert_eq!(status.queues[queues::REPORTS].pending, 1);
    revived.shutdown().await;
}

#[tokio::test]
async fn triggered_task_runs_its_job() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path());
    orch.initialize().await.unwrap();

    orch.trigger_task("seo-regeneration").await.unwrap();

    let sitemap = dir.path().join("public/sitemap.xml");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !sitemap.exists() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(sitemap.exists());

    assert!(matches!(
        orch.trigger_task("no-such-task").await,
        Err(WorkflowError::Scheduler(_))
    ));
    orch.shutdown().await;
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.scheduler.timezone = "Moon/Tranquility".into();
    let orch = WorkflowOrchestrator::new(config, Collaborators::default());

    assert!(matches!(
        orch.initialize().await,
        Err(WorkflowError::Config(_))
    ));
    assert!(!orch.is_initialized().await);
}

#[tokio::test]
async fn disabled_scheduler_still_processes_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.scheduler.enabled = false;
    let orch = WorkflowOrchestrator::new(config, Collaborators::default());
    orch.initialize().await.unwrap();

    let status = orch.get_system_status().await;
    assert!(status.initialized);
    assert!(!status.scheduler_running);
    assert!(status.tasks.iter().all(|t| !t.active));
    assert!(orch.engine().await.unwrap().is_processing().await);
    orch.shutdown().await;
}
