//! Customer notification fan-out over email and WhatsApp.

use std::fmt;
use std::sync::Arc;

use scorehub_job_queue::{async_trait, JobData, JobQueueError, QueueWorker};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{parse_payload, JobError};
use crate::{job_types, queues};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Whatsapp,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Email => f.write_str("email"),
            Channel::Whatsapp => f.write_str("whatsapp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub channel: Channel,
    pub recipient: String,
    pub message: String,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Delivery backend for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), JobError>;
}

/// Notifier that writes each notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), JobError> {
        info!(
            channel = %notification.channel,
            recipient = %notification.recipient,
            "notification delivered to log"
        );
        Ok(())
    }
}

/// Worker for the `notifications` queue.
pub struct NotificationWorker {
    notifier: Arc<dyn Notifier>,
}

impl NotificationWorker {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl QueueWorker for NotificationWorker {
    fn queue(&self) -> &str {
        queues::NOTIFICATIONS
    }

    async fn execute(&self, job: JobData) -> Result<(), JobQueueError> {
        if job.job_type == job_types::CAMPAIGN_SWEEP {
            info!(data = %job.data, "campaign sweep acknowledged");
            return Ok(());
        }

        let notification: Notification = parse_payload(job.data)?;
        if notification.recipient.trim().is_empty() {
            return Err(JobError::invalid("empty recipient").into());
        }
        self.notifier.notify(&notification).await?;
        Ok(())
    }
}
