//! Persistent entities of the governance engine.

mod binding;
mod execution;
mod task;
mod template;

pub use binding::{sort_by_priority, FieldRuleBinding};
pub use execution::{quality_score, Execution, ExecutionStatus, ExecutionType, IssueRecord, Severity};
pub use task::{QualityTask, TaskStatus};
pub use template::{ConfigMap, RuleTemplate, TemplateKind};

pub(crate) fn default_true() -> bool {
    true
}
