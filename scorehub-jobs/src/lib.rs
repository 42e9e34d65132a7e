//! Concrete queue workers for the ScoreHub backend.
//!
//! This crate provides implementations of the
//! [`QueueWorker`](scorehub_job_queue::QueueWorker) trait, one per named queue.
//!
//! # Queues
//!
//! - `email` - Transactional email through a [`Mailer`]
//! - `pdf-processing` - Per-order copies of purchased scores
//! - `notifications` - Email and WhatsApp fan-out through a [`Notifier`]
//! - `reports` - Daily, weekly and monthly report files
//! - `cleanup` - Removal of stale temporary files
//! - `backup` - Data directory snapshots with retention
//! - `seo` - Sitemap and robots.txt generation and checks
//!
//! # Usage
//!
//! ```rust,no_run
//! use scorehub_job_queue::{QueueConfig, QueueEngine};
//! use scorehub_jobs::{queues, register_all_workers, WorkerContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = QueueEngine::builder(QueueConfig::default())
//!         .queues(queues::DEFAULT_QUEUES)
//!         .build();
//!     register_all_workers(&engine, &WorkerContext::rooted_at("./var"))
//!         .await
//!         .unwrap();
//! }
//! ```

mod backup;
mod cleanup;
mod context;
mod email;
mod error;
mod notifications;
mod pdf;
mod reports;
mod seo;

pub use backup::BackupWorker;
pub use cleanup::CleanupWorker;
pub use context::WorkerContext;
pub use email::{EmailMessage, EmailWorker, LogMailer, Mailer};
pub use error::JobError;
pub use notifications::{Channel, LogNotifier, Notification, NotificationWorker, Notifier};
pub use pdf::{PdfPayload, PdfWorker};
pub use reports::{job_type_for, ReportKind, ReportWorker};
pub use seo::{SeoWorker, ROBOTS_FILE, SITEMAP_FILE};

use std::sync::Arc;

use scorehub_job_queue::{JobQueueError, QueueEngine, QueueWorker};

/// Register a worker for every default queue.
pub async fn register_all_workers(
    engine: &QueueEngine,
    ctx: &WorkerContext,
) -> Result<(), JobQueueError> {
    let workers: Vec<Arc<dyn QueueWorker>> = vec![
        Arc::new(EmailWorker::new(Arc::clone(&ctx.mailer))),
        Arc::new(PdfWorker::new(&ctx.uploads_dir, &ctx.watermarked_dir)),
        Arc::new(NotificationWorker::new(Arc::clone(&ctx.notifier))),
        Arc::new(ReportWorker::new(&ctx.reports_dir)),
        Arc::new(CleanupWorker::new(ctx.temp_dirs.clone(), ctx.cleanup_max_age)),
        Arc::new(BackupWorker::new(&ctx.data_dir, &ctx.backup_dir, ctx.backup_keep)),
        Arc::new(SeoWorker::new(
            ctx.site_url.clone(),
            &ctx.public_dir,
            ctx.routes.clone(),
        )),
    ];
    for worker in workers {
        engine.register_worker(worker).await?;
    }
    Ok(())
}

/// Queue name constants.
pub mod queues {
    pub const EMAIL: &str = "email";
    pub const PDF_PROCESSING: &str = "pdf-processing";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const REPORTS: &str = "reports";
    pub const CLEANUP: &str = "cleanup";
    pub const BACKUP: &str = "backup";
    pub const SEO: &str = "seo";

    /// The queues created at startup.
    pub const DEFAULT_QUEUES: [&str; 7] = [
        EMAIL,
        PDF_PROCESSING,
        NOTIFICATIONS,
        REPORTS,
        CLEANUP,
        BACKUP,
        SEO,
    ];
}

/// Job type constants for type-safe job references.
pub mod job_types {
    pub const GENERATE_SITEMAP: &str = "generate-sitemap";
    pub const SEO_HEALTH_CHECK: &str = "health-check";
    pub const CAMPAIGN_SWEEP: &str = "campaign-sweep";
    pub const DAILY_REPORT: &str = "daily-report";
    pub const WEEKLY_REPORT: &str = "weekly-report";
    pub const MONTHLY_REPORT: &str = "monthly-report";
    pub const FILE_CLEANUP: &str = "file-cleanup";
    pub const DATABASE_BACKUP: &str = "database-backup";
}
