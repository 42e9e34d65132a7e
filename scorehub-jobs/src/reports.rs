//! Periodic sales report generation.

use std::path::PathBuf;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use scorehub_job_queue::{async_trait, JobData, JobQueueError, QueueWorker};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::JobError;
use crate::{job_types, queues};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Daily,
    Weekly,
    Monthly,
}

impl ReportKind {
    /// Map a job type such as `weekly-report` (or bare `weekly`) to a kind.
    pub fn from_job_type(job_type: &str) -> Option<Self> {
        match job_type.strip_suffix("-report").unwrap_or(job_type) {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// The most recent complete period before `now`, as `[start, end)`.
    pub fn period(self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let today = now.date_naive();
        let start_date = match self {
            Self::Daily => today - Duration::days(1),
            Self::Weekly => today - Duration::days(7),
            Self::Monthly => previous_month_start(today),
        };
        let end_date = match self {
            Self::Monthly => today.with_day(1).unwrap_or(today),
            _ => today,
        };
        (midnight(start_date), midnight(end_date))
    }
}

fn previous_month_start(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    kind: ReportKind,
    generated_at: DateTime<Utc>,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    request: &'a Value,
}

/// Worker for the `reports` queue.
#[derive(Debug, Clone)]
pub struct ReportWorker {
    reports_dir: PathBuf,
}

impl ReportWorker {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    /// Write the report for `kind` as of `now` and return its path.
    pub async fn generate(
        &self,
        kind: ReportKind,
        request: &Value,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, JobError> {
        let (period_start, period_end) = kind.period(now);
        let document = ReportDocument {
            kind,
            generated_at: now,
            period_start,
            period_end,
            request,
        };

        tokio::fs::create_dir_all(&self.reports_dir).await?;
        let path = self.reports_dir.join(format!(
            "{}-{}.json",
            kind.as_str(),
            now.format("%Y%m%dT%H%M%S%3fZ")
        ));
        tokio::fs::write(&path, serde_json::to_vec_pretty(&document)?).await?;
        info!(
            kind = kind.as_str(),
            path = %path.display(),
            %period_start,
            %period_end,
            "report written"
        );
        Ok(path)
    }
}

#[async_trait]
impl QueueWorker for ReportWorker {
    fn queue(&self) -> &str {
        queues::REPORTS
    }

    async fn execute(&self, job: JobData) -> Result<(), JobQueueError> {
        let kind = ReportKind::from_job_type(&job.job_type)
            .or_else(|| {
                job.data
                    .get("kind")
                    .and_then(Value::as_str)
                    .and_then(ReportKind::from_job_type)
            })
            .ok_or_else(|| JobError::UnsupportedType(job.job_type.clone()))?;
        self.generate(kind, &job.data, Utc::now()).await?;
        Ok(())
    }
}

/// Job type used by the recurring task for `kind`.
pub fn job_type_for(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Daily => job_types::DAILY_REPORT,
        ReportKind::Weekly => job_types::WEEKLY_REPORT,
        ReportKind::Monthly => job_types::MONTHLY_REPORT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn period_bounds() {
        let now = ts("2024-03-05T09:00:00Z");
        assert_eq!(
            ReportKind::Daily.period(now),
            (ts("2024-03-04T00:00:00Z"), ts("2024-03-05T00:00:00Z"))
        );
        assert_eq!(
            ReportKind::Weekly.period(now),
            (ts("2024-02-27T00:00:00Z"), ts("2024-03-05T00:00:00Z"))
        );
        assert_eq!(
            ReportKind::Monthly.period(now),
            (ts("2024-02-01T00:00:00Z"), ts("2024-03-01T00:00:00Z"))
        );
        assert_eq!(
            ReportKind::Monthly.period(ts("2024-01-01T09:00:00Z")),
            (ts("2023-12-01T00:00:00Z"), ts("2024-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn kinds_from_job_types() {
        assert_eq!(ReportKind::from_job_type("weekly-report"), Some(ReportKind::Weekly));
        assert_eq!(ReportKind::from_job_type("monthly"), Some(ReportKind::Monthly));
        assert_eq!(ReportKind::from_job_type("quarterly-report"), None);
        assert_eq!(job_type_for(ReportKind::Daily), "daily-report");
    }

    #[tokio::test]
    async fn writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ReportWorker::new(dir.path().join("reports"));
        let path = worker
            .generate(
                ReportKind::Weekly,
                &json!({"requested_by": "scheduler"}),
                ts("2024-03-05T09:00:00Z"),
            )
            .await
            .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "weekly-20240305T090000000Z.json"
        );
        let doc: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc["kind"], "weekly");
        assert_eq!(doc["request"]["requested_by"], "scheduler");
        assert_eq!(doc["period_end"], "2024-03-05T00:00:00Z");
    }

    #[tokio::test]
    async fn unknown_kind_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ReportWorker::new(dir.path());
        let err = worker
            .execute(JobData::new("quarterly-report", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, JobQueueError::InvalidPayload(_)));
    }
}
