//! Durable snapshots of queue state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::types::{Job, QueueStats};

/// Default file name used under the data directory.
pub const DEFAULT_STATE_FILE: &str = "queue-state.json";

/// Persisted state of one queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedQueue {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub in_flight: Option<Job>,
    #[serde(default)]
    pub history: Vec<Job>,
    #[serde(default)]
    pub stats: QueueStats,
}

/// Full snapshot of every queue, written as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub queues: BTreeMap<String, PersistedQueue>,
}

/// Persistence backend for the queue engine.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Read the last snapshot. `Ok(None)` means nothing has been saved yet.
    async fn load(&self) -> Result<Option<StoreSnapshot>, StoreError>;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError>;
}

/// Stores the snapshot as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Build a store for [`DEFAULT_STATE_FILE`] inside `dir`.
    #[must_use]
    pub fn in_directory<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl JobStore for JsonFileStore {
    async fn load(&self) -> Result<Option<StoreSnapshot>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Keeps the last snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<StoreSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the last saved snapshot.
    pub async fn snapshot(&self) -> Option<StoreSnapshot> {
        self.snapshot.lock().await.clone()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn load(&self) -> Result<Option<StoreSnapshot>, StoreError> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        *self.snapshot.lock().await = Some(snapshot.clone());
        Ok(())
    }
}
