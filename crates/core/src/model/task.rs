use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::default_true;
use super::execution::ExecutionStatus;
use crate::schedule::ScheduleConfig;

/// Lifecycle state of a task, mirrored from its latest execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    CompletedWithIssues,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::CompletedWithIssues => "completed_with_issues",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ExecutionStatus> for TaskStatus {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Running => TaskStatus::Running,
            ExecutionStatus::Completed => TaskStatus::Completed,
            ExecutionStatus::CompletedWithIssues => TaskStatus::CompletedWithIssues,
            ExecutionStatus::Failed => TaskStatus::Failed,
        }
    }
}

/// The schedulable unit: one target table, a trigger, and run statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityTask {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub target_schema: String,
    pub target_table: String,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_execution: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl QualityTask {
    pub fn new(
        id: impl Into<String>,
        target_schema: impl Into<String>,
        target_table: impl Into<String>,
        schedule: ScheduleConfig,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: None,
            target_schema: target_schema.into(),
            target_table: target_table.into(),
            schedule,
            priority: 0,
            status: TaskStatus::Pending,
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            next_execution: None,
            last_executed: None,
            is_enabled: true,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }
}
