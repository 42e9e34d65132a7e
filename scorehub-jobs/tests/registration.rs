use scorehub_job_queue::{EnqueueOptions, JobData, JobQueueError, JobStatus, QueueConfig, QueueEngine};
use scorehub_jobs::{job_types, queues, register_all_workers, WorkerContext};
use serde_json::json;

fn engine() -> QueueEngine {
    QueueEngine::builder(QueueConfig {
        auto_start: false,
        ..QueueConfig::default()
    })
    .queues(queues::DEFAULT_QUEUES)
    .build()
}

#[tokio::test]
async fn every_default_queue_gets_a_worker() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    register_all_workers(&engine, &WorkerContext::rooted_at(dir.path()))
        .await
        .unwrap();

    assert_eq!(engine.worker_count().await, queues::DEFAULT_QUEUES.len());
    for queue in queues::DEFAULT_QUEUES {
        assert!(engine.has_worker(queue).await, "{queue} has no worker");
    }

    let again = register_all_workers(&engine, &WorkerContext::rooted_at(dir.path())).await;
    assert!(matches!(again, Err(JobQueueError::WorkerAlreadyRegistered(_))));
}

#[tokio::test]
async fn jobs_run_through_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = WorkerContext::rooted_at(dir.path());
    std::fs::create_dir_all(&ctx.uploads_dir).unwrap();
    std::fs::write(ctx.uploads_dir.join("etude.pdf"), b"%PDF").unwrap();

    let engine = engine();
    register_all_workers(&engine, &ctx).await.unwrap();

    let pdf_id = engine
        .enqueue(
            queues::PDF_PROCESSING,
            JobData::new(
                "watermark",
                json!({"order_id": "77", "file": "etude.pdf", "buyer_email": "b@example.com"}),
            ),
            EnqueueOptions::default(),
        )
        .await
        .unwrap();
    let seo_id = engine
        .enqueue(
            queues::SEO,
            JobData::new(job_types::GENERATE_SITEMAP, json!({})),
            EnqueueOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(engine.drain_queue(queues::PDF_PROCESSING).await.unwrap(), 1);
    assert_eq!(engine.drain_queue(queues::SEO).await.unwrap(), 1);

    assert_eq!(engine.get_job(&pdf_id).unwrap().status, JobStatus::Completed);
    assert_eq!(engine.get_job(&seo_id).unwrap().status, JobStatus::Completed);
    assert!(ctx.watermarked_dir.join("etude-order-77.pdf").exists());
    assert!(ctx.public_dir.join("sitemap.xml").exists());
}

#[tokio::test]
async fn malformed_payload_fails_on_first_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    register_all_workers(&engine, &WorkerContext::rooted_at(dir.path()))
        .await
        .unwrap();

    let id = engine
        .enqueue(
            queues::PDF_PROCESSING,
            JobData::new("watermark", json!({"order_id": "1", "file": "../secrets.pdf"})),
            EnqueueOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(engine.drain_queue(queues::PDF_PROCESSING).await.unwrap(), 1);

    let job = engine.get_job(&id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
    let stats = engine.queue_stats(queues::PDF_PROCESSING).await.unwrap().stats;
    assert_eq!(stats.retries, 0);
}
