//! In-memory [`TaskStore`] and [`TemplateStore`].
//!
//! Used by the `steward` binary when running against a workspace file, and
//! as fixtures in tests. All state lives behind one `RwLock` per store so
//! partial updates are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use steward_core::{
    sort_by_priority, Execution, FieldRuleBinding, IssueRecord, QualityTask, RuleTemplate,
    ScheduleType,
};
use steward_rules::builtin_templates;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::ports::{StoreResult, TaskStore, TaskUpdate, TemplateStore};

// ── Tasks ───────────────────────────────────────────────────────────

#[derive(Default)]
struct TaskTables {
    tasks: IndexMap<String, QualityTask>,
    bindings: IndexMap<String, FieldRuleBinding>,
    executions: IndexMap<String, Execution>,
    issues: Vec<IssueRecord>,
}

#[derive(Default)]
pub struct MemoryTaskStore {
    inner: RwLock<TaskTables>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total issues stored across all executions.
    pub async fn issue_count(&self) -> usize {
        self.inner.read().await.issues.len()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get_task(&self, id: &str) -> StoreResult<QualityTask> {
        self.inner
            .read()
            .await
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    async fn list_tasks(&self) -> StoreResult<Vec<QualityTask>> {
        Ok(self.inner.read().await.tasks.values().cloned().collect())
    }

    async fn save_task(&self, mut task: QualityTask) -> StoreResult<()> {
        let now = Utc::now();
        task.created_at.get_or_insert(now);
        task.updated_at = Some(now);
        self.inner.write().await.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.tasks.shift_remove(id).is_none() {
            return Err(StoreError::not_found("task", id));
        }
        inner.bindings.retain(|_, b| b.task_id != id);
        Ok(())
    }

    async fn schedulable_tasks(&self) -> StoreResult<Vec<QualityTask>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.is_enabled && ScheduleType::SCHEDULABLE.contains(&t.schedule.schedule_type))
            .cloned()
            .collect())
    }

    async fn due_interval_tasks(&self, now: DateTime<Utc>) -> StoreResult<Vec<QualityTask>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tasks
            .values()
            .filter(|t| t.is_enabled && t.schedule.schedule_type == ScheduleType::Interval)
            .filter(|t| t.next_execution.map_or(true, |next| next <= now))
            .cloned()
            .collect())
    }

    async fn update_task(&self, id: &str, update: TaskUpdate) -> StoreResult<QualityTask> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("task", id))?;
        update.apply(task, Utc::now());
        Ok(task.clone())
    }

    async fn save_binding(&self, mut binding: FieldRuleBinding) -> StoreResult<()> {
        if binding.id.is_empty() {
            binding.id = Uuid::new_v4().to_string();
        }
        self.inner
            .write()
            .await
            .bindings
            .insert(binding.id.clone(), binding);
        Ok(())
    }

    async fn enabled_bindings(&self, task_id: &str) -> StoreResult<Vec<FieldRuleBinding>> {
        let mut bindings: Vec<FieldRuleBinding> = self
            .inner
            .read()
            .await
            .bindings
            .values()
            .filter(|b| b.task_id == task_id && b.is_enabled)
            .cloned()
            .collect();
        sort_by_priority(&mut bindings);
        Ok(bindings)
    }

    async fn save_execution(&self, execution: &Execution) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .executions
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> StoreResult<Execution> {
        self.inner
            .read()
            .await
            .executions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("execution", id))
    }

    async fn executions_for_task(&self, task_id: &str) -> StoreResult<Vec<Execution>> {
        let mut executions: Vec<Execution> = self
            .inner
            .read()
            .await
            .executions
            .values()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(executions)
    }

    async fn insert_issues(&self, issues: Vec<IssueRecord>) -> StoreResult<()> {
        self.inner.write().await.issues.extend(issues);
        Ok(())
    }

    async fn issues_for_execution(&self, execution_id: &str) -> StoreResult<Vec<IssueRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .issues
            .iter()
            .filter(|i| i.execution_id == execution_id)
            .cloned()
            .collect())
    }
}

// ── Templates ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<IndexMap<String, RuleTemplate>>,
}

impl MemoryTemplateStore {
    /// Empty store, no built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the built-in catalog.
    pub fn with_builtins() -> steward_rules::Result<Self> {
        let templates = builtin_templates()?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        Ok(Self {
            templates: RwLock::new(templates),
        })
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn get_enabled(&self, id: &str) -> StoreResult<Option<RuleTemplate>> {
        Ok(self
            .templates
            .read()
            .await
            .get(id)
            .filter(|t| t.is_enabled)
            .cloned())
    }

    async fn list_templates(&self) -> StoreResult<Vec<RuleTemplate>> {
        Ok(self.templates.read().await.values().cloned().collect())
    }

    async fn save_template(&self, mut template: RuleTemplate) -> StoreResult<()> {
        let mut templates = self.templates.write().await;
        if templates.get(&template.id).is_some_and(|t| t.is_built_in) {
            return Err(StoreError::Conflict(format!(
                "built-in template '{}' cannot be modified",
                template.id
            )));
        }
        template.created_at.get_or_insert_with(Utc::now);
        templates.insert(template.id.clone(), template);
        Ok(())
    }

    async fn delete_template(&self, id: &str) -> StoreResult<()> {
        let mut templates = self.templates.write().await;
        match templates.get(id) {
            None => Err(StoreError::not_found("template", id)),
            Some(t) if t.is_built_in => Err(StoreError::Conflict(format!(
                "built-in template '{}' cannot be deleted",
                id
            ))),
            Some(_) => {
                templates.shift_remove(id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use steward_core::{ExecutionStatus, ScheduleConfig, TaskStatus, TemplateKind};

    fn make_task(id: &str, schedule: ScheduleConfig) -> QualityTask {
        QualityTask::new(id, "public", "users", schedule)
    }

    #[tokio::test]
    async fn schedulable_and_due_queries() {
        let store = MemoryTaskStore::new();
        let now = Utc::now();
        store.save_task(make_task("manual", ScheduleConfig::manual())).await.unwrap();
        store.save_task(make_task("cron", ScheduleConfig::cron("0 * * * * *"))).await.unwrap();
        let mut due = make_task("due", ScheduleConfig::interval(60));
        due.next_execution = Some(now - Duration::seconds(1));
        store.save_task(due).await.unwrap();
        let mut later = make_task("later", ScheduleConfig::interval(60));
        later.next_execution = Some(now + Duration::seconds(60));
        store.save_task(later).await.unwrap();
        let mut off = make_task("off", ScheduleConfig::interval(60));
        off.is_enabled = false;
        store.save_task(off).await.unwrap();
        store.save_task(make_task("fresh", ScheduleConfig::interval(60))).await.unwrap();

        let ids = |tasks: Vec<QualityTask>| tasks.into_iter().map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(
            ids(store.schedulable_tasks().await.unwrap()),
            vec!["cron", "due", "later", "fresh"]
        );
        assert_eq!(ids(store.due_interval_tasks(now).await.unwrap()), vec!["due", "fresh"]);
    }

    #[tokio::test]
    async fn update_counts_runs() {
        let store = MemoryTaskStore::new();
        store.save_task(make_task("t", ScheduleConfig::manual())).await.unwrap();

        let update = TaskUpdate {
            status: Some(TaskStatus::Failed),
            record_run: Some(ExecutionStatus::Failed),
            ..TaskUpdate::default()
        };
        store.update_task("t", update).await.unwrap();
        let update = TaskUpdate {
            status: Some(TaskStatus::CompletedWithIssues),
            record_run: Some(ExecutionStatus::CompletedWithIssues),
            ..TaskUpdate::default()
        };
        let task = store.update_task("t", update).await.unwrap();

        assert_eq!(task.execution_count, 2);
        assert_eq!(task.success_count, 1);
        assert_eq!(task.failure_count, 1);
        assert_eq!(task.status, TaskStatus::CompletedWithIssues);
        assert!(matches!(
            store.update_task("missing", TaskUpdate::default()).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn bindings_sorted_and_removed_with_task() {
        let store = MemoryTaskStore::new();
        store.save_task(make_task("t", ScheduleConfig::manual())).await.unwrap();
        for (id, priority, enabled) in [("a", 10, true), ("b", 90, true), ("c", 50, false)] {
            let mut b = FieldRuleBinding::new("f", "tpl").with_priority(priority);
            b.id = id.to_string();
            b.task_id = "t".to_string();
            b.is_enabled = enabled;
            store.save_binding(b).await.unwrap();
        }
        let ids: Vec<String> = store
            .enabled_bindings("t")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);

        store.delete_task("t").await.unwrap();
        assert!(store.enabled_bindings("t").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn builtins_are_protected() {
        let store = MemoryTemplateStore::with_builtins().unwrap();
        let builtin = store.get_enabled("completeness_template_001").await.unwrap().unwrap();
        assert!(builtin.is_built_in);

        assert!(matches!(
            store.save_template(builtin.clone()).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.delete_template("completeness_template_001").await,
            Err(StoreError::Conflict(_))
        ));

        let mut custom = RuleTemplate::new("custom", TemplateKind::Quality, "completeness");
        store.save_template(custom.clone()).await.unwrap();
        custom.is_enabled = false;
        store.save_template(custom).await.unwrap();
        assert!(store.get_enabled("custom").await.unwrap().is_none());
        store.delete_template("custom").await.unwrap();
        assert!(matches!(
            store.delete_template("custom").await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
