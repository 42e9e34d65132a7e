//! Startup, recurring tasks and shutdown of the ScoreHub background system.
//!
//! [`WorkflowOrchestrator`] wires the queue engine, the concrete workers and
//! the scheduler together from a resolved [`Config`](scorehub_config::Config).
//!
//! ```rust,no_run
//! use scorehub_config::Config;
//! use scorehub_workflows::{Collaborators, WorkflowOrchestrator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = WorkflowOrchestrator::new(Config::default(), Collaborators::default());
//!     orchestrator.initialize().await.unwrap();
//!     let status = orchestrator.get_system_status().await;
//!     println!("{}", serde_json::to_string_pretty(&status).unwrap());
//!     orchestrator.shutdown().await;
//! }
//! ```

mod error;
mod memory;
mod orchestrator;
mod tasks;

pub use error::WorkflowError;
pub use memory::resident_memory_mb;
pub use orchestrator::{queue_config, Collaborators, SystemStatus, WorkflowOrchestrator};
pub use tasks::{default_task_names, define_default_tasks, MEMORY_HEALTH, QUEUE_SELF_HEAL};
