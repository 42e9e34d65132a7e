//! Job lifecycle notifications.

use serde::{Deserialize, Serialize};

/// Emitted by the engine on every job transition.
///
/// Delivered over a `tokio::sync::broadcast` channel; slow subscribers lag
/// and lose the oldest events rather than slowing the engine down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Added {
        queue: String,
        job_id: String,
    },
    Started {
        queue: String,
        job_id: String,
        attempt: u32,
    },
    Completed {
        queue: String,
        job_id: String,
    },
    Retrying {
        queue: String,
        job_id: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    Failed {
        queue: String,
        job_id: String,
        error: String,
    },
}

impl JobEvent {
    pub fn queue(&self) -> &str {
        match self {
            Self::Added { queue, .. }
            | Self::Started { queue, .. }
            | Self::Completed { queue, .. }
            | Self::Retrying { queue, .. }
            | Self::Failed { queue, .. } => queue,
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Self::Added { job_id, .. }
            | Self::Started { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Retrying { job_id, .. }
            | Self::Failed { job_id, .. } => job_id,
        }
    }
}
