//! Shared settings and collaborators handed to every worker.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::email::{LogMailer, Mailer};
use crate::notifications::{LogNotifier, Notifier};

/// Everything the concrete workers need from the outside world.
#[derive(Clone)]
pub struct WorkerContext {
    pub uploads_dir: PathBuf,
    pub watermarked_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_keep: usize,
    pub temp_dirs: Vec<PathBuf>,
    pub cleanup_max_age: Duration,
    pub site_url: String,
    pub public_dir: PathBuf,
    pub routes: Vec<String>,
    pub mailer: Arc<dyn Mailer>,
    pub notifier: Arc<dyn Notifier>,
}

impl WorkerContext {
    /// Lay every directory out under `root` with logging collaborators.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            uploads_dir: root.join("uploads"),
            watermarked_dir: root.join("uploads").join("watermarked"),
            reports_dir: root.join("reports"),
            data_dir: root.join("data"),
            backup_dir: root.join("backups"),
            backup_keep: 7,
            temp_dirs: vec![root.join("tmp")],
            cleanup_max_age: Duration::from_secs(24 * 60 * 60),
            site_url: "http://localhost:3000".to_string(),
            public_dir: root.join("public"),
            routes: vec!["/".to_string()],
            mailer: Arc::new(LogMailer),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("uploads_dir", &self.uploads_dir)
            .field("watermarked_dir", &self.watermarked_dir)
            .field("reports_dir", &self.reports_dir)
            .field("data_dir", &self.data_dir)
            .field("backup_dir", &self.backup_dir)
            .field("backup_keep", &self.backup_keep)
            .field("temp_dirs", &self.temp_dirs)
            .field("cleanup_max_age", &self.cleanup_max_age)
            .field("site_url", &self.site_url)
            .field("public_dir", &self.public_dir)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}
