//! YAML workspace fixture: templates, tasks, bindings and inline tables
//! loaded into the in-memory stores.
//!
//! ```yaml
//! tasks:
//!   - id: users-daily
//!     target_schema: public
//!     target_table: users
//!     schedule: { type: cron, cron_expression: "0 0 2 * * *" }
//! bindings:
//!   - task_id: users-daily
//!     field_name: email
//!     rule_template_id: accuracy_template_001
//!     priority: 80
//! tables:
//!   public.users:
//!     - { id: 1, email: "a@example.com" }
//! ```

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use steward_core::{calculate_next_execution, FieldRuleBinding, QualityTask, Record, RuleTemplate};
use steward_rules::{
    validate_binding, validate_task, validate_template, TemplateMap, ValidationResult,
};
use tracing::{info, warn};

use crate::error::{ExecutionError, Result};
use crate::memory::{MemoryTaskStore, MemoryTemplateStore};
use crate::ports::{TaskStore, TemplateStore};
use crate::scan::MemoryTableScanner;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workspace {
    /// Custom templates, added on top of the built-in catalog.
    #[serde(default)]
    pub templates: Vec<RuleTemplate>,
    #[serde(default)]
    pub tasks: Vec<QualityTask>,
    #[serde(default)]
    pub bindings: Vec<FieldRuleBinding>,
    /// Inline rows keyed by `schema.table`.
    #[serde(default)]
    pub tables: IndexMap<String, Vec<Record>>,
}

/// Memory-backed stores populated from a workspace.
pub struct Stores {
    pub tasks: Arc<MemoryTaskStore>,
    pub templates: Arc<MemoryTemplateStore>,
    pub tables: Arc<MemoryTableScanner>,
}

impl Workspace {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let workspace = Self::from_yaml(&content)?;
        info!(
            path = %path.display(),
            templates = workspace.templates.len(),
            tasks = workspace.tasks.len(),
            bindings = workspace.bindings.len(),
            tables = workspace.tables.len(),
            "workspace loaded"
        );
        Ok(workspace)
    }

    /// Validate and load everything into fresh memory stores.
    ///
    /// Invalid templates, tasks and bindings are logged and skipped, as are
    /// bindings whose task was not loaded. A malformed table key or a custom
    /// template that shadows a built-in rejects the whole workspace.
    /// Tasks without a next execution get one computed from now.
    pub async fn into_stores(self) -> Result<Stores> {
        let mut skipped = 0usize;

        let templates = MemoryTemplateStore::with_builtins()?;
        for template in self.templates {
            if !check(&format!("template {}", template.id), validate_template(&template)) {
                skipped += 1;
                continue;
            }
            templates.save_template(template).await?;
        }

        let known: TemplateMap = templates
            .list_templates()
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        let tasks = MemoryTaskStore::new();
        let now = Utc::now();
        for mut task in self.tasks {
            let label = format!("task {}", task.id);
            if !check(&label, validate_task(&task)) {
                skipped += 1;
                continue;
            }
            if task.next_execution.is_none() {
                match calculate_next_execution(&task.schedule, now) {
                    Ok(next) => task.next_execution = next,
                    Err(e) => {
                        warn!(item = %label, error = %e, "skipping task with unusable schedule");
                        skipped += 1;
                        continue;
                    }
                }
            }
            tasks.save_task(task).await?;
        }

        for binding in self.bindings {
            let label = format!("binding {}.{}", binding.task_id, binding.field_name);
            if !check(&label, validate_binding(&binding, &known)) {
                skipped += 1;
                continue;
            }
            if tasks.get_task(&binding.task_id).await.is_err() {
                warn!(item = %label, task_id = %binding.task_id, "skipping binding for unknown task");
                skipped += 1;
                continue;
            }
            tasks.save_binding(binding).await?;
        }

        let tables = MemoryTableScanner::new();
        for (key, rows) in self.tables {
            let Some((schema, table)) = key.split_once('.') else {
                return Err(ExecutionError::Workspace(format!(
                    "table key '{}' must be <schema>.<table>",
                    key
                )));
            };
            tables.insert_table(schema, table, rows).await;
        }

        if skipped > 0 {
            warn!(skipped, "workspace entries skipped");
        }
        Ok(Stores {
            tasks: Arc::new(tasks),
            templates: Arc::new(templates),
            tables: Arc::new(tables),
        })
    }
}

/// Log the findings for one entry; `false` when it must be skipped.
fn check(label: &str, result: ValidationResult) -> bool {
    for w in &result.warnings {
        warn!(item = %label, path = %w.path, "{}", w.message);
    }
    if !result.valid {
        warn!(item = %label, errors = %result.summary(), "skipping invalid entry");
    }
    result.valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::TableScanner;
    use futures::TryStreamExt;
    use steward_core::ScheduleType;

    const WORKSPACE: &str = r#"
templates:
  - id: upper_code
    kind: quality
    type: standardization
    rule_logic: { standard_format: uppercase }
tasks:
  - id: users-daily
    target_schema: public
    target_table: users
    schedule: { type: interval, interval_seconds: 300 }
  - id: adhoc
    target_schema: public
    target_table: users
bindings:
  - task_id: users-daily
    field_name: email
    rule_template_id: accuracy_template_001
    priority: 80
  - task_id: users-daily
    field_name: code
    rule_template_id: upper_code
tables:
  public.users:
    - { id: 1, email: a@example.com, code: AB }
    - { id: 2, email: nope, code: cd }
"#;

    #[tokio::test]
    async fn loads_into_stores() {
        let stores = Workspace::from_yaml(WORKSPACE).unwrap().into_stores().await.unwrap();

        let task = stores.tasks.get_task("users-daily").await.unwrap();
        assert_eq!(task.schedule.schedule_type, ScheduleType::Interval);
        assert!(task.next_execution.is_some());
        let adhoc = stores.tasks.get_task("adhoc").await.unwrap();
        assert_eq!(adhoc.schedule.schedule_type, ScheduleType::Manual);
        assert!(adhoc.next_execution.is_none());

        let bindings = stores.tasks.enabled_bindings("users-daily").await.unwrap();
        assert_eq!(bindings[0].field_name, "email");
        assert!(stores.templates.get_enabled("upper_code").await.unwrap().is_some());

        let rows: Vec<Record> = stores
            .tables
            .scan("public", "users")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn skips_dangling_binding() {
        let yaml = "bindings:\n  - task_id: ghost\n    field_name: a\n    rule_template_id: completeness_template_001\n";
        let stores = Workspace::from_yaml(yaml).unwrap().into_stores().await.unwrap();
        assert!(stores.tasks.enabled_bindings("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_tasks_are_skipped_and_the_rest_loads() {
        let yaml = r#"
tasks:
  - id: good
    target_schema: public
    target_table: users
    schedule: { type: interval, interval_seconds: 60 }
  - id: bad
    target_schema: public
    target_table: users
    schedule: { type: cron, cron_expression: "not a cron" }
  - id: zero
    target_schema: public
    target_table: users
    schedule: { type: interval, interval_seconds: 0 }
bindings:
  - task_id: good
    field_name: name
    rule_template_id: completeness_template_001
  - task_id: bad
    field_name: name
    rule_template_id: completeness_template_001
  - task_id: good
    field_name: email
    rule_template_id: no_such_template
"#;
        let stores = Workspace::from_yaml(yaml).unwrap().into_stores().await.unwrap();

        let ids: Vec<String> = stores
            .tasks
            .list_tasks()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["good".to_string()]);
        let bindings = stores.tasks.enabled_bindings("good").await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].field_name, "name");
        assert!(stores.tasks.enabled_bindings("bad").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_table_key_is_rejected() {
        let yaml = "tables:\n  users: []\n";
        let err = Workspace::from_yaml(yaml).unwrap().into_stores().await.err().unwrap();
        assert!(err.to_string().contains("<schema>.<table>"));
    }

    #[tokio::test]
    async fn builtin_override_is_rejected() {
        let yaml = "templates:\n  - id: completeness_template_001\n    kind: quality\n    type: completeness\n";
        let err = Workspace::from_yaml(yaml).unwrap().into_stores().await.err().unwrap();
        assert!(matches!(err, ExecutionError::Store(crate::error::StoreError::Conflict(_))));
    }
}
