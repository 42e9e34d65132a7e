//! Cron scheduler for recurring ScoreHub work.
//!
//! Tasks are named, bound to a cron expression and an IANA timezone, and
//! either run an inline action or enqueue a job on the
//! [`QueueEngine`](scorehub_job_queue::QueueEngine). A failing action is
//! logged and counted; it never disarms its task.
//!
//! ```rust,no_run
//! use scorehub_scheduler::{Scheduler, TaskAction, TaskError};
//!
//! #[tokio::main]
//! async fn main() {
//!     let scheduler = Scheduler::new();
//!     scheduler
//!         .define_task(
//!             "heartbeat",
//!             "*/5 * * * *",
//!             "Europe/Berlin",
//!             TaskAction::inline(|| async {
//!                 tracing::info!("still alive");
//!                 Ok::<(), TaskError>(())
//!             }),
//!         )
//!         .unwrap();
//!     scheduler.start().await;
//! }
//! ```

mod action;
mod error;
mod schedule;
mod scheduler;

pub use action::TaskAction;
pub use error::{SchedulerError, TaskError};
pub use schedule::TaskSchedule;
pub use scheduler::{Scheduler, TaskStatus};
