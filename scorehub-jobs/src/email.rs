//! Transactional email delivery.

use std::sync::Arc;

use scorehub_job_queue::{async_trait, JobData, JobQueueError, QueueWorker};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{parse_payload, JobError};
use crate::queues;

/// A rendered-or-templated message ready for a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Outbound mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), JobError>;
}

/// Mailer that only records the message in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), JobError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            template = ?message.template,
            "email delivered to log"
        );
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct EmailPayload {
    to: Option<String>,
    subject: Option<String>,
    template: Option<String>,
    body: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

/// Worker for the `email` queue.
pub struct EmailWorker {
    mailer: Arc<dyn Mailer>,
}

impl EmailWorker {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    fn message(job: JobData) -> Result<EmailMessage, JobError> {
        let payload: EmailPayload = parse_payload(job.data)?;
        let to = payload
            .to
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| JobError::invalid("missing recipient `to`"))?;
        if !to.contains('@') {
            return Err(JobError::invalid(format!("invalid recipient: {to}")));
        }
        Ok(EmailMessage {
            to,
            subject: payload.subject.unwrap_or_else(|| job.job_type.clone()),
            template: payload.template.or(Some(job.job_type)),
            body: payload.body,
            data: Value::Object(payload.extra),
        })
    }
}

#[async_trait]
impl QueueWorker for EmailWorker {
    fn queue(&self) -> &str {
        queues::EMAIL
    }

    async fn execute(&self, job: JobData) -> Result<(), JobQueueError> {
        let message = Self::message(job)?;
        self.mailer.send(&message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), JobError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn sends_through_mailer() {
        let mailer = Arc::new(RecordingMailer::default());
        let worker = EmailWorker::new(mailer.clone());
        assert_eq!(worker.queue(), "email");

        worker
            .execute(JobData::new(
                "order-confirmation",
                json!({"to": "buyer@example.com", "subject": "Your scores", "order_id": "A-17"}),
            ))
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "buyer@example.com");
        assert_eq!(sent[0].subject, "Your scores");
        assert_eq!(sent[0].template.as_deref(), Some("order-confirmation"));
        assert_eq!(sent[0].data["order_id"], "A-17");
    }

    #[tokio::test]
    async fn missing_recipient_is_invalid() {
        let worker = EmailWorker::new(Arc::new(LogMailer));
        let err = worker
            .execute(JobData::new("welcome", json!({"subject": "hi"})))
            .await
            .unwrap_err();
        assert!(matches!(err, JobQueueError::InvalidPayload(_)));
    }
}
