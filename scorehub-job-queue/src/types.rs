//! Core types for the job queue system.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Work description handed to a queue's worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub data: Value,
}

impl JobData {
    #[inline]
    pub fn new(job_type: impl Into<String>, data: Value) -> Self {
        Self {
            job_type: job_type.into(),
            data,
        }
    }
}

/// Per-enqueue knobs. Unset values fall back to the engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueOptions {
    #[serde(default)]
    pub priority: i32,
    #[serde(default, rename = "delay_ms", with = "opt_millis")]
    pub delay: Option<Duration>,
    #[serde(default, rename = "maxRetries")]
    pub max_retries: Option<u32>,
}

impl EnqueueOptions {
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Retrying,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns true if this status represents a terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// A unit of deferred work owned by one named queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: String,
    #[serde(flatten)]
    pub data: JobData,
    pub priority: i32,
    pub attempts: u32,
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        queue: impl Into<String>,
        data: JobData,
        priority: i32,
        max_attempts: u32,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            queue: queue.into(),
            data,
            priority,
            attempts: 0,
            max_attempts,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            status: JobStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            last_attempt_at: None,
            last_error: None,
        }
    }

    /// Earliest instant at which the job may be dispatched.
    ///
    /// The delay counts from creation, or from the last failed attempt once
    /// the job has been retried. A delay past the end of the calendar
    /// saturates to [`DateTime::<Utc>::MAX_UTC`].
    pub fn eligible_at(&self) -> DateTime<Utc> {
        let anchor = self.last_attempt_at.unwrap_or(self.created_at);
        i64::try_from(self.delay_ms)
            .ok()
            .and_then(chrono::Duration::try_milliseconds)
            .and_then(|delay| anchor.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    #[inline]
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.delay_ms == 0 || now >= self.eligible_at()
    }

    /// Mark the job as running.
    #[inline]
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
    }

    /// Mark the job as completed.
    #[inline]
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
    }

    /// Record a failed attempt. Returns true if another attempt is allowed.
    pub fn record_failure(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> bool {
        self.attempts += 1;
        self.last_error = Some(message.into());
        self.last_attempt_at = Some(now);
        self.attempts < self.max_attempts
    }

    /// Schedule another attempt after `delay`.
    #[inline]
    pub fn retry_after(&mut self, delay: Duration) {
        self.status = JobStatus::Retrying;
        self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    }

    /// Return a retrying job to `pending` once its backoff has elapsed.
    /// Returns true if the status changed.
    pub fn release_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == JobStatus::Retrying && self.is_eligible(now) {
            self.status = JobStatus::Pending;
            return true;
        }
        false
    }

    /// Mark the job as permanently failed.
    #[inline]
    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.failed_at = Some(now);
    }
}

/// Cumulative per-queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub retries: u64,
}

/// Point-in-time view of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub name: String,
    pub pending: usize,
    pub processing: bool,
    pub has_worker: bool,
    pub stats: QueueStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn job_data_uses_type_on_the_wire() {
        let data = JobData::new("order-confirmation", json!({"to": "a@b.c"}));
        let v = serde_json::to_value(&data).unwrap();
        assert_eq!(v["type"], "order-confirmation");
        assert_eq!(v["data"]["to"], "a@b.c");
    }

    #[test]
    fn enqueue_options_accept_wire_names() {
        let opts: EnqueueOptions =
            serde_json::from_value(json!({"priority": 4, "delay_ms": 250, "maxRetries": 5}))
                .unwrap();
        assert_eq!(opts.priority, 4);
        assert_eq!(opts.delay, Some(Duration::from_millis(250)));
        assert_eq!(opts.max_retries, Some(5));
    }

    #[test]
    fn eligibility_counts_from_last_attempt() {
        let created = ts("2024-01-01T00:00:00Z");
        let mut job = Job::new(
            "email",
            JobData::new("x", Value::Null),
            0,
            3,
            Duration::from_secs(5),
            created,
        );
        assert!(!job.is_eligible(ts("2024-01-01T00:00:04Z")));
        assert!(job.is_eligible(ts("2024-01-01T00:00:05Z")));

        assert!(job.record_failure("boom", ts("2024-01-01T00:01:00Z")));
        job.retry_after(Duration::from_secs(10));
        assert_eq!(job.status, JobStatus::Retrying);
        assert!(!job.is_eligible(ts("2024-01-01T00:01:09Z")));
        assert!(job.is_eligible(ts("2024-01-01T00:01:10Z")));
    }

    #[test]
    fn failure_budget_is_bounded_by_max_attempts() {
        let now = ts("2024-01-01T00:00:00Z");
        let mut job = Job::new("email", JobData::new("x", Value::Null), 0, 2, Duration::ZERO, now);
        assert!(job.record_failure("one", now));
        assert!(!job.record_failure("two", now));
        assert_eq!(job.attempts, 2);
        assert_eq!(job.last_error.as_deref(), Some("two"));
    }

    #[test]
    fn oversized_delay_saturates_instead_of_overflowing() {
        let created = ts("2024-01-01T00:00:00Z");
        let job = Job::new(
            "email",
            JobData::new("x", Value::Null),
            0,
            3,
            Duration::from_millis(u64::MAX),
            created,
        );
        assert_eq!(job.eligible_at(), DateTime::<Utc>::MAX_UTC);
        assert!(!job.is_eligible(ts("9999-12-31T23:59:59Z")));

        let mut near_end = job.clone();
        near_end.delay_ms = 1_000;
        near_end.created_at = DateTime::<Utc>::MAX_UTC;
        assert_eq!(near_end.eligible_at(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn retrying_job_returns_to_pending_after_backoff() {
        let now = ts("2024-01-01T00:00:00Z");
        let mut job = Job::new("email", JobData::new("x", Value::Null), 0, 3, Duration::ZERO, now);
        job.start(now);
        assert!(job.record_failure("boom", now));
        job.retry_after(Duration::from_secs(30));

        assert!(!job.release_if_due(ts("2024-01-01T00:00:29Z")));
        assert_eq!(job.status, JobStatus::Retrying);
        assert!(job.release_if_due(ts("2024-01-01T00:00:30Z")));
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.release_if_due(ts("2024-01-01T00:00:31Z")));
    }
}
