//! Per-order copies of purchased sheet music.

use std::path::{Component, Path, PathBuf};

use scorehub_job_queue::{async_trait, JobData, JobQueueError, QueueWorker};
use serde::Deserialize;
use tracing::info;

use crate::error::{parse_payload, JobError};
use crate::queues;

#[derive(Debug, Deserialize)]
pub struct PdfPayload {
    pub order_id: String,
    pub file: String,
    pub buyer_email: String,
}

/// Worker for the `pdf-processing` queue.
///
/// Copies the uploaded score into the watermarked directory under an
/// order-stamped name. The stamping of the document itself happens
/// downstream.
#[derive(Debug, Clone)]
pub struct PdfWorker {
    uploads_dir: PathBuf,
    watermarked_dir: PathBuf,
}

impl PdfWorker {
    pub fn new(uploads_dir: impl Into<PathBuf>, watermarked_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            watermarked_dir: watermarked_dir.into(),
        }
    }

    /// Destination path for `file` purchased in `order_id`.
    pub fn output_path(&self, file: &str, order_id: &str) -> PathBuf {
        let path = Path::new(file);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("score");
        let name = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}-order-{order_id}.{ext}"),
            None => format!("{stem}-order-{order_id}"),
        };
        self.watermarked_dir.join(name)
    }

    async fn process(&self, payload: PdfPayload) -> Result<PathBuf, JobError> {
        if payload.order_id.trim().is_empty() {
            return Err(JobError::invalid("empty order_id"));
        }
        if !payload
            .order_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(JobError::invalid(format!(
                "order_id has unsupported characters: {}",
                payload.order_id
            )));
        }
        if !payload.buyer_email.contains('@') {
            return Err(JobError::invalid(format!(
                "invalid buyer_email: {}",
                payload.buyer_email
            )));
        }
        let relative = Path::new(&payload.file);
        if payload.file.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(JobError::invalid(format!(
                "file must be relative to uploads: {}",
                payload.file
            )));
        }

        let source = self.uploads_dir.join(relative);
        if !tokio::fs::try_exists(&source).await? {
            return Err(JobError::MissingFile(source));
        }

        tokio::fs::create_dir_all(&self.watermarked_dir).await?;
        let target = self.output_path(&payload.file, &payload.order_id);
        let bytes = tokio::fs::copy(&source, &target).await?;
        info!(
            order_id = %payload.order_id,
            buyer = %payload.buyer_email,
            output = %target.display(),
            bytes,
            "order copy prepared"
        );
        Ok(target)
    }
}

#[async_trait]
impl QueueWorker for PdfWorker {
    fn queue(&self) -> &str {
        queues::PDF_PROCESSING
    }

    async fn execute(&self, job: JobData) -> Result<(), JobQueueError> {
        let payload: PdfPayload = parse_payload(job.data)?;
        self.process(payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn copies_into_watermarked_dir() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(uploads.join("scores")).unwrap();
        std::fs::write(uploads.join("scores/nocturne.pdf"), b"%PDF-1.7").unwrap();

        let worker = PdfWorker::new(&uploads, uploads.join("watermarked"));
        worker
            .execute(JobData::new(
                "watermark",
                json!({"order_id": "ord-42", "file": "scores/nocturne.pdf", "buyer_email": "b@example.com"}),
            ))
            .await
            .unwrap();

        let out = uploads.join("watermarked/nocturne-order-ord-42.pdf");
        assert_eq!(std::fs::read(out).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn missing_source_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let worker = PdfWorker::new(dir.path(), dir.path().join("out"));
        let err = worker
            .execute(JobData::new(
                "watermark",
                json!({"order_id": "1", "file": "gone.pdf", "buyer_email": "b@example.com"}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, JobQueueError::ExecutionFailed(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn rejects_escaping_paths_and_bad_fields() {
        let dir = tempfile::tempdir().unwrap();
        let worker = PdfWorker::new(dir.path(), dir.path().join("out"));
        for data in [
            json!({"order_id": "1", "file": "../etc/passwd", "buyer_email": "b@example.com"}),
            json!({"order_id": "1", "file": "/etc/passwd", "buyer_email": "b@example.com"}),
            json!({"order_id": "1/2", "file": "a.pdf", "buyer_email": "b@example.com"}),
            json!({"order_id": "1", "file": "a.pdf", "buyer_email": "nobody"}),
            json!({"order_id": "1", "file": "a.pdf"}),
        ] {
            let err = worker
                .execute(JobData::new("watermark", data))
                .await
                .unwrap_err();
            assert!(matches!(err, JobQueueError::InvalidPayload(_)), "{err}");
            assert!(!err.is_retryable());
        }
    }
}
