//! Removal of stale temporary files.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use scorehub_job_queue::{async_trait, JobData, JobQueueError, QueueWorker};
use tracing::{debug, info, warn};

use crate::error::JobError;
use crate::queues;

/// Worker for the `cleanup` queue.
#[derive(Debug, Clone)]
pub struct CleanupWorker {
    dirs: Vec<PathBuf>,
    max_age: Duration,
}

impl CleanupWorker {
    pub fn new(dirs: Vec<PathBuf>, max_age: Duration) -> Self {
        Self { dirs, max_age }
    }

    /// Delete regular files at least `max_age` old from every directory.
    /// Missing directories are skipped. Returns the number of files removed.
    pub async fn sweep(&self) -> Result<usize, JobError> {
        let now = SystemTime::now();
        let mut removed = 0;
        for dir in &self.dirs {
            removed += sweep_dir(dir, self.max_age, now).await?;
        }
        Ok(removed)
    }
}

async fn sweep_dir(dir: &Path, max_age: Duration, now: SystemTime) -> Result<usize, JobError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "cleanup directory does not exist");
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            // Raced with another remover.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "failed to remove stale file");
                return Err(e.into());
            }
        }
    }
    Ok(removed)
}

#[async_trait]
impl QueueWorker for CleanupWorker {
    fn queue(&self) -> &str {
        queues::CLEANUP
    }

    async fn execute(&self, _job: JobData) -> Result<(), JobQueueError> {
        let removed = self.sweep().await?;
        info!(removed, max_age = ?self.max_age, "temporary file cleanup finished");
        Ok(())
    }
}
