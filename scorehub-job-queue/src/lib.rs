//! Persistent, priority-ordered job queue used by the ScoreHub backend.
//!
//! The engine owns a fixed set of named queues. Each queue has at most one
//! worker and at most one job in flight; failed jobs are retried with a
//! linear backoff until their attempt budget runs out. Every transition is
//! written to a [`JobStore`] so pending work survives a restart.
//!
//! # Architecture
//!
//! - [`QueueEngine`] - Named queues, the processing loop and the enqueue API
//! - [`QueueWorker`] - Trait for implementing queue handlers
//! - [`JobStore`] - Snapshot persistence ([`JsonFileStore`], [`MemoryStore`])
//! - [`JobEvent`] - Lifecycle notifications for observers
//! - [`Clock`] - Time source, swappable for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use scorehub_job_queue::{
//!     async_trait, EnqueueOptions, JobData, JobQueueError, QueueConfig, QueueEngine, QueueWorker,
//! };
//! use serde_json::json;
//!
//! struct EmailWorker;
//!
//! #[async_trait]
//! impl QueueWorker for EmailWorker {
//!     fn queue(&self) -> &str {
//!         "email"
//!     }
//!
//!     async fn execute(&self, job: JobData) -> Result<(), JobQueueError> {
//!         println!("sending {}: {}", job.job_type, job.data);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = QueueEngine::builder(QueueConfig::default())
//!         .queues(["email"])
//!         .build();
//!     engine.register_worker(Arc::new(EmailWorker)).await.unwrap();
//!
//!     let id = engine
//!         .enqueue(
//!             "email",
//!             JobData::new("order-confirmation", json!({"to": "buyer@example.com"})),
//!             EnqueueOptions::default().priority(5),
//!         )
//!         .await
//!         .unwrap();
//!     println!("enqueued job {id}");
//! }
//! ```

mod clock;
mod engine;
mod error;
mod events;
mod store;
mod types;
mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{QueueConfig, QueueEngine, QueueEngineBuilder};
pub use error::{JobQueueError, StoreError};
pub use events::JobEvent;
pub use store::{JobStore, JsonFileStore, MemoryStore, PersistedQueue, StoreSnapshot, DEFAULT_STATE_FILE};
pub use types::{EnqueueOptions, Job, JobData, JobStatus, QueueStats, QueueStatus};
pub use worker::{FnWorker, QueueWorker};

// Re-export async_trait for convenience when implementing QueueWorker
pub use async_trait::async_trait;
