//! Collaborator contracts the execution service and the coordinator depend on.
//!
//! Persistence and row access are external to the engine. Anything that
//! implements these traits can back it; the crate ships in-memory and
//! JSON-lines implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use steward_core::{
    Execution, ExecutionStatus, FieldRuleBinding, IssueRecord, QualityTask, Record, RuleTemplate,
    ScheduleConfig, TaskStatus,
};

use crate::error::{ScanError, StoreError};

/// Result alias for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Forward-only cursor over the rows of one table.
pub type RowStream = BoxStream<'static, std::result::Result<Record, ScanError>>;

// ── TaskStore ───────────────────────────────────────────────────────

/// Partial update applied to a task atomically.
///
/// `None` leaves a column untouched. `record_run` bumps `execution_count`
/// and one of `success_count` / `failure_count` depending on the status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub schedule: Option<ScheduleConfig>,
    /// `Some(None)` clears the column.
    pub next_execution: Option<Option<DateTime<Utc>>>,
    pub last_executed: Option<DateTime<Utc>>,
    pub record_run: Option<ExecutionStatus>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn next_execution(next: Option<DateTime<Utc>>) -> Self {
        Self {
            next_execution: Some(next),
            ..Self::default()
        }
    }

    /// Apply to an in-memory task row.
    pub fn apply(&self, task: &mut QualityTask, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(schedule) = &self.schedule {
            task.schedule = schedule.clone();
        }
        if let Some(next) = self.next_execution {
            task.next_execution = next;
        }
        if let Some(at) = self.last_executed {
            task.last_executed = Some(at);
        }
        if let Some(status) = self.record_run {
            task.execution_count += 1;
            if status.is_success() {
                task.success_count += 1;
            } else {
                task.failure_count += 1;
            }
        }
        task.updated_at = Some(now);
    }
}

/// Tasks, bindings, executions and issues.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, id: &str) -> StoreResult<QualityTask>;

    async fn list_tasks(&self) -> StoreResult<Vec<QualityTask>>;

    /// Insert or replace by ID.
    async fn save_task(&self, task: QualityTask) -> StoreResult<()>;

    /// Delete a task together with its bindings.
    async fn delete_task(&self, id: &str) -> StoreResult<()>;

    /// Enabled tasks whose schedule type is cron, interval or once.
    async fn schedulable_tasks(&self) -> StoreResult<Vec<QualityTask>>;

    /// Enabled interval tasks with no next execution or one at or before `now`.
    async fn due_interval_tasks(&self, now: DateTime<Utc>) -> StoreResult<Vec<QualityTask>>;

    /// Apply `update` atomically and return the updated task.
    async fn update_task(&self, id: &str, update: TaskUpdate) -> StoreResult<QualityTask>;

    /// Insert or replace a binding by ID.
    async fn save_binding(&self, binding: FieldRuleBinding) -> StoreResult<()>;

    /// Enabled bindings of a task, highest priority first.
    async fn enabled_bindings(&self, task_id: &str) -> StoreResult<Vec<FieldRuleBinding>>;

    async fn save_execution(&self, execution: &Execution) -> StoreResult<()>;

    async fn get_execution(&self, id: &str) -> StoreResult<Execution>;

    /// Executions of a task, most recent first.
    async fn executions_for_task(&self, task_id: &str) -> StoreResult<Vec<Execution>>;

    async fn insert_issues(&self, issues: Vec<IssueRecord>) -> StoreResult<()>;

    async fn issues_for_execution(&self, execution_id: &str) -> StoreResult<Vec<IssueRecord>>;
}

// ── TemplateStore ───────────────────────────────────────────────────

/// Rule templates of all three kinds.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Enabled template by ID, `None` if absent or disabled.
    async fn get_enabled(&self, id: &str) -> StoreResult<Option<RuleTemplate>>;

    async fn list_templates(&self) -> StoreResult<Vec<RuleTemplate>>;

    /// Insert or replace by ID. Built-in templates cannot be replaced.
    async fn save_template(&self, template: RuleTemplate) -> StoreResult<()>;

    /// Built-in templates cannot be deleted.
    async fn delete_template(&self, id: &str) -> StoreResult<()>;
}

// ── TableScanner ────────────────────────────────────────────────────

/// Column metadata reported by a scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Row source for a `schema.table` pair.
#[async_trait]
pub trait TableScanner: Send + Sync {
    async fn columns(&self, schema: &str, table: &str) -> std::result::Result<Vec<ColumnInfo>, ScanError>;

    /// Open a cursor. Rows arrive in table order.
    async fn scan(&self, schema: &str, table: &str) -> std::result::Result<RowStream, ScanError>;
}
