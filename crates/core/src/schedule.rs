//! Schedule types and next-firing arithmetic.
//!
//! [`calculate_next_execution`] is the single source of truth for when a task
//! fires next. The coordinator's cron loops parse expressions through
//! [`parse_cron`] as well, so both always agree on firing times.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StewardError};

/// How a quality task is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    #[default]
    Manual,
    Once,
    Interval,
    Cron,
}

impl ScheduleType {
    /// Schedule types the coordinator registers on start.
    pub const SCHEDULABLE: [ScheduleType; 3] =
        [ScheduleType::Cron, ScheduleType::Interval, ScheduleType::Once];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Manual => "manual",
            ScheduleType::Once => "once",
            ScheduleType::Interval => "interval",
            ScheduleType::Cron => "cron",
        }
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleType {
    type Err = StewardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "manual" => Ok(ScheduleType::Manual),
            "once" => Ok(ScheduleType::Once),
            "interval" => Ok(ScheduleType::Interval),
            "cron" => Ok(ScheduleType::Cron),
            other => Err(StewardError::InvalidSchedule(format!(
                "unknown schedule type: '{}'",
                other
            ))),
        }
    }
}

/// Trigger configuration of a task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(rename = "type", default)]
    pub schedule_type: ScheduleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl ScheduleConfig {
    pub fn manual() -> Self {
        Self::default()
    }

    pub fn cron(expression: impl Into<String>) -> Self {
        Self {
            schedule_type: ScheduleType::Cron,
            cron_expression: Some(expression.into()),
            ..Self::default()
        }
    }

    pub fn interval(seconds: i64) -> Self {
        Self {
            schedule_type: ScheduleType::Interval,
            interval_seconds: Some(seconds),
            ..Self::default()
        }
    }

    pub fn once(at: DateTime<Utc>) -> Self {
        Self {
            schedule_type: ScheduleType::Once,
            scheduled_time: Some(at),
            ..Self::default()
        }
    }

    /// Reject configurations that can never fire.
    ///
    /// A `once` schedule in the past is still valid here: it simply yields
    /// no next execution.
    pub fn validate(&self) -> Result<()> {
        match self.schedule_type {
            ScheduleType::Manual | ScheduleType::Once => Ok(()),
            ScheduleType::Interval => self.interval_duration().map(|_| ()),
            ScheduleType::Cron => parse_cron(self.cron_expression.as_deref().unwrap_or("")).map(|_| ()),
        }
    }

    /// Interval as a positive duration.
    pub fn interval_duration(&self) -> Result<Duration> {
        match self.interval_seconds {
            Some(secs) if secs > 0 => Duration::try_seconds(secs).ok_or_else(|| {
                StewardError::InvalidSchedule(format!("interval of {} seconds is out of range", secs))
            }),
            other => Err(StewardError::InvalidSchedule(format!(
                "interval must be a positive number of seconds, got {}",
                other.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string())
            ))),
        }
    }
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate wants `sec min hour day-of-month month day-of-week`;
/// seconds are optional for callers.
pub fn normalize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Parse a cron expression with optional seconds.
pub fn parse_cron(expression: &str) -> Result<Schedule> {
    if expression.trim().is_empty() {
        return Err(StewardError::InvalidSchedule(
            "cron expression is empty".to_string(),
        ));
    }
    Schedule::from_str(&normalize_cron(expression)).map_err(|e| {
        StewardError::InvalidSchedule(format!(
            "invalid cron expression '{}': {} (expected 6 fields: sec min hour dom month dow, e.g. '0 */5 * * * *')",
            expression, e
        ))
    })
}

/// Next firing time of `config` strictly after `reference`.
///
/// `Ok(None)` means the task never fires again on its own (manual tasks,
/// and `once` tasks whose time has passed).
pub fn calculate_next_execution(
    config: &ScheduleConfig,
    reference: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    match config.schedule_type {
        ScheduleType::Manual => Ok(None),
        ScheduleType::Once => Ok(config.scheduled_time.filter(|at| *at > reference)),
        ScheduleType::Interval => {
            let interval = config.interval_duration()?;
            reference
                .checked_add_signed(interval)
                .map(Some)
                .ok_or_else(|| {
                    StewardError::InvalidSchedule(format!(
                        "interval of {} seconds overflows from {}",
                        interval.num_seconds(),
                        reference
                    ))
                })
        }
        ScheduleType::Cron => {
            let schedule = parse_cron(config.cron_expression.as_deref().unwrap_or(""))?;
            Ok(schedule.after(&reference).next())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 2, 30).unwrap()
    }

    #[test]
    fn manual_never_fires() {
        assert_eq!(calculate_next_execution(&ScheduleConfig::manual(), t0()).unwrap(), None);
    }

    #[test]
    fn interval_adds_exact_seconds() {
        let next = calculate_next_execution(&ScheduleConfig::interval(300), t0()).unwrap();
        assert_eq!(next, Some(t0() + Duration::seconds(300)));
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        for secs in [0, -5] {
            let err = calculate_next_execution(&ScheduleConfig::interval(secs), t0()).unwrap_err();
            assert!(matches!(err, StewardError::InvalidSchedule(_)));
        }
        let missing = ScheduleConfig {
            schedule_type: ScheduleType::Interval,
            ..ScheduleConfig::default()
        };
        assert!(calculate_next_execution(&missing, t0()).is_err());
    }

    #[test]
    fn out_of_range_interval_is_rejected() {
        let huge = ScheduleConfig::interval(i64::MAX);
        assert!(matches!(huge.validate(), Err(StewardError::InvalidSchedule(_))));
        assert!(matches!(
            calculate_next_execution(&huge, t0()),
            Err(StewardError::InvalidSchedule(_))
        ));

        // Representable as a duration, but not once added to the reference.
        let far = ScheduleConfig::interval(i64::MAX / 1_000 - 1);
        assert!(far.interval_duration().is_ok());
        assert!(matches!(
            calculate_next_execution(&far, t0()),
            Err(StewardError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn once_only_in_the_future() {
        let future = t0() + Duration::hours(1);
        let past = t0() - Duration::hours(1);
        assert_eq!(
            calculate_next_execution(&ScheduleConfig::once(future), t0()).unwrap(),
            Some(future)
        );
        assert_eq!(calculate_next_execution(&ScheduleConfig::once(past), t0()).unwrap(), None);
        assert_eq!(calculate_next_execution(&ScheduleConfig::once(t0()), t0()).unwrap(), None);
    }

    #[test]
    fn cron_six_field_with_seconds() {
        let next = calculate_next_execution(&ScheduleConfig::cron("0 */5 * * * *"), t0()).unwrap();
        assert_eq!(next, Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap()));
    }

    #[test]
    fn cron_five_field_gets_zero_seconds() {
        assert_eq!(normalize_cron("*/5 * * * *"), "0 */5 * * * *");
        assert_eq!(normalize_cron(" 0 0 * * * * "), "0 0 * * * *");
        let next = calculate_next_execution(&ScheduleConfig::cron("0 11 * * *"), t0()).unwrap();
        assert_eq!(next, Some(Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap()));
    }

    #[test]
    fn cron_empty_or_garbage_is_rejected() {
        assert!(calculate_next_execution(&ScheduleConfig::cron(""), t0()).is_err());
        assert!(calculate_next_execution(&ScheduleConfig::cron("not a cron"), t0()).is_err());
        let no_expr = ScheduleConfig {
            schedule_type: ScheduleType::Cron,
            ..ScheduleConfig::default()
        };
        assert!(no_expr.validate().is_err());
    }

    #[test]
    fn schedule_type_round_trips_through_str() {
        for ty in [
            ScheduleType::Manual,
            ScheduleType::Once,
            ScheduleType::Interval,
            ScheduleType::Cron,
        ] {
            assert_eq!(ty.as_str().parse::<ScheduleType>().unwrap(), ty);
        }
        assert!("weekly".parse::<ScheduleType>().is_err());
    }
}
