use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::record::RecordIdentifier;

/// What started an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    CompletedWithIssues,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::CompletedWithIssues => "completed_with_issues",
            ExecutionStatus::Failed => "failed",
        }
    }

    /// Finished without an infrastructure failure.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::CompletedWithIssues)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Passed over total checks, 1.0 when nothing was checked.
pub fn quality_score(passed: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        (passed.min(total) as f64) / (total as f64)
    }
}

/// One run of a quality task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub task_id: String,
    pub execution_type: ExecutionType,
    pub triggered_by: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    pub status: ExecutionStatus,
    pub total_rules_executed: u64,
    pub passed_rules: u64,
    pub failed_rules: u64,
    pub overall_score: f64,
    pub issue_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_results: Option<Value>,
}

impl Execution {
    /// A fresh execution in `running` state.
    pub fn start(
        task_id: impl Into<String>,
        execution_type: ExecutionType,
        triggered_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            execution_type,
            triggered_by: triggered_by.into(),
            start_time: now,
            end_time: None,
            duration_ms: None,
            status: ExecutionStatus::Running,
            total_rules_executed: 0,
            passed_rules: 0,
            failed_rules: 0,
            overall_score: 1.0,
            issue_count: 0,
            error_message: None,
            execution_results: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != ExecutionStatus::Running
    }
}

/// Issue severity, derived from the priority of the binding that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_priority(priority: i32) -> Self {
        match priority {
            p if p >= 80 => Severity::Critical,
            p if p >= 60 => Severity::High,
            p if p >= 40 => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// One failed check on one row. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: String,
    pub execution_id: String,
    pub task_id: String,
    pub field_name: String,
    pub rule_template_id: String,
    pub record_identifier: RecordIdentifier,
    pub issue_type: String,
    pub issue_description: String,
    pub field_value: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bands() {
        assert_eq!(Severity::from_priority(100), Severity::Critical);
        assert_eq!(Severity::from_priority(80), Severity::Critical);
        assert_eq!(Severity::from_priority(79), Severity::High);
        assert_eq!(Severity::from_priority(60), Severity::High);
        assert_eq!(Severity::from_priority(59), Severity::Medium);
        assert_eq!(Severity::from_priority(40), Severity::Medium);
        assert_eq!(Severity::from_priority(39), Severity::Low);
        assert_eq!(Severity::from_priority(-1), Severity::Low);
    }

    #[test]
    fn score_bounds() {
        assert_eq!(quality_score(0, 0), 1.0);
        assert_eq!(quality_score(0, 2), 0.0);
        assert_eq!(quality_score(1, 4), 0.25);
        assert_eq!(quality_score(5, 5), 1.0);
        assert!(quality_score(9, 3) <= 1.0);
    }

    #[test]
    fn new_execution_is_running() {
        let exec = Execution::start("t1", ExecutionType::Manual, "cli", Utc::now());
        assert_eq!(exec.status, ExecutionStatus::Running);
        assert!(!exec.is_finished());
        assert_eq!(exec.overall_score, 1.0);
    }
}
