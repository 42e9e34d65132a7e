//! Snapshot copies of the data directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use scorehub_job_queue::{async_trait, JobData, JobQueueError, QueueWorker};
use tracing::{info, warn};

use crate::error::JobError;
use crate::queues;

const BACKUP_PREFIX: &str = "backup-";

/// Worker for the `backup` queue.
///
/// Each run copies the data directory into `<backup_dir>/backup-<timestamp>/`
/// and then removes the oldest backups so that at most `keep` remain.
#[derive(Debug, Clone)]
pub struct BackupWorker {
    data_dir: PathBuf,
    backup_dir: PathBuf,
    keep: usize,
}

impl BackupWorker {
    pub fn new(data_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>, keep: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            backup_dir: backup_dir.into(),
            keep: keep.max(1),
        }
    }

    /// Create one backup stamped with `now`. Returns its directory.
    pub async fn create(&self, now: DateTime<Utc>) -> Result<PathBuf, JobError> {
        if !tokio::fs::try_exists(&self.data_dir).await? {
            return Err(JobError::MissingFile(self.data_dir.clone()));
        }
        let target = self.backup_dir.join(format!(
            "{BACKUP_PREFIX}{}",
            now.format("%Y%m%dT%H%M%S%3fZ")
        ));
        tokio::fs::create_dir_all(&target).await?;
        let files = copy_tree(&self.data_dir, &target, &self.backup_dir).await?;
        info!(target = %target.display(), files, "backup created");
        Ok(target)
    }

    /// Delete backups beyond the newest `keep`. Returns how many were removed.
    pub async fn prune(&self) -> Result<usize, JobError> {
        let mut backups = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.backup_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(BACKUP_PREFIX) && entry.file_type().await?.is_dir() {
                backups.push(name);
            }
        }
        // Timestamps sort lexicographically.
        backups.sort();
        let excess = backups.len().saturating_sub(self.keep);
        for name in backups.iter().take(excess) {
            let path = self.backup_dir.join(name);
            if let Err(e) = tokio::fs::remove_dir_all(&path).await {
                warn!(path = %path.display(), error = %e, "failed to prune backup");
                return Err(e.into());
            }
        }
        Ok(excess)
    }
}

/// Recursively copy regular files from `src` into `dst`, skipping `exclude`.
async fn copy_tree(src: &Path, dst: &Path, exclude: &Path) -> Result<usize, JobError> {
    let mut copied = 0;
    let mut pending = vec![(src.to_path_buf(), dst.to_path_buf())];
    while let Some((from, to)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path == exclude {
                continue;
            }
            let file_type = entry.file_type().await?;
            let dest = to.join(entry.file_name());
            if file_type.is_dir() {
                tokio::fs::create_dir_all(&dest).await?;
                pending.push((path, dest));
            } else if file_type.is_file() {
                tokio::fs::copy(&path, &dest).await?;
                copied += 1;
            }
        }
    }
    Ok(copied)
}

#[async_trait]
impl QueueWorker for BackupWorker {
    fn queue(&self) -> &str {
        queues::BACKUP
    }

    async fn execute(&self, _job: JobData) -> Result<(), JobQueueError> {
        self.create(Utc::now()).await?;
        let pruned = self.prune().await?;
        if pruned > 0 {
            info!(pruned, keep = self.keep, "old backups pruned");
        }
        Ok(())
    }
}
