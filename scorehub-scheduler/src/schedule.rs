//! Cron expressions bound to a timezone.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::SchedulerError;

const WEEKDAYS: [&str; 8] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// A parsed cron schedule evaluated in an IANA timezone.
#[derive(Clone)]
pub struct TaskSchedule {
    expression: String,
    schedule: Schedule,
    timezone: Tz,
}

impl fmt::Debug for TaskSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSchedule")
            .field("expression", &self.expression)
            .field("timezone", &self.timezone.name())
            .finish()
    }
}

impl TaskSchedule {
    /// Parse `expression` for `timezone`.
    ///
    /// Classic five-field expressions (`min hour dom mon dow`, Sunday = 0 or 7)
    /// are accepted alongside the six and seven field forms with seconds.
    pub fn parse(expression: &str, timezone: &str) -> Result<Self, SchedulerError> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(timezone.to_owned()))?;
        let normalized = normalize_expression(expression);
        let schedule =
            Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
                expression: expression.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expression: expression.to_owned(),
            schedule,
            timezone,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> &str {
        self.timezone.name()
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.timezone))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Rewrite a five-field expression into the seconds-first form.
fn normalize_expression(expression: &str) -> String {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return fields.join(" ");
    }
    format!(
        "0 {} {} {} {} {}",
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        weekday_names(fields[4])
    )
}

/// Replace numeric weekdays with names; the cron crate counts Sunday as 1.
fn weekday_names(field: &str) -> String {
    field
        .split(',')
        .map(|part| match part.split_once('/') {
            Some((range, step)) => format!("{}/{}", translate_range(range), step),
            None => translate_range(part),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn translate_range(range: &str) -> String {
    range
        .split('-')
        .map(|day| match day.parse::<usize>() {
            Ok(n) if n < WEEKDAYS.len() => WEEKDAYS[n].to_owned(),
            _ => day.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("-")
}
