//! [`TaskExecutionService`]: one quality-check run over one table.
//!
//! Loads the task and its enabled bindings, streams rows from the
//! [`TableScanner`], runs every binding's quality check per row through the
//! [`RuleEngine`], writes one [`IssueRecord`] per failed check and finally
//! updates the execution and the task statistics.
//!
//! The service holds no locks. Callers guarantee a single runner per task
//! (the coordinator does so with its lease and status check).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use steward_core::record::display_value;
use steward_core::{
    quality_score, Execution, ExecutionStatus, ExecutionType, FieldRuleBinding, IssueRecord,
    QualityTask, Record, RecordIdentifier, RuleTemplate, Severity, TaskStatus, TemplateKind,
};
use steward_rules::quality::QualityRuleType;
use steward_rules::{uniqueness_key, EffectiveConfig, FieldCheck, RuleEngine, TemplateMap};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::ports::{TableScanner, TaskStore, TaskUpdate, TemplateStore};

/// Issues are written in batches of this size while scanning.
const ISSUE_BATCH: usize = 500;

const ISSUE_TYPE: &str = "validation_failed";

/// A binding with its template resolved once per execution.
struct PreparedBinding {
    binding: FieldRuleBinding,
    template: Option<RuleTemplate>,
    /// Set for uniqueness templates: the config used to key seen values.
    uniqueness: Option<EffectiveConfig>,
}

#[derive(Debug, Default)]
struct BindingTally {
    checks: u64,
    failures: u64,
}

/// Counters accumulated over one scan.
#[derive(Debug, Default)]
struct ScanTally {
    table: String,
    rows: u64,
    total: u64,
    passed: u64,
    issues: u64,
    per_binding: Vec<(FieldRuleBinding, BindingTally)>,
}

impl ScanTally {
    fn failed(&self) -> u64 {
        self.total - self.passed
    }

    fn summary(&self) -> serde_json::Value {
        let bindings: Vec<_> = self
            .per_binding
            .iter()
            .map(|(b, t)| {
                json!({
                    "binding_id": b.id,
                    "field": b.field_name,
                    "rule_template_id": b.rule_template_id,
                    "checks": t.checks,
                    "failures": t.failures,
                })
            })
            .collect();
        json!({
            "table": self.table,
            "rows_processed": self.rows,
            "bindings": bindings,
        })
    }
}

pub struct TaskExecutionService {
    tasks: Arc<dyn TaskStore>,
    templates: Arc<dyn TemplateStore>,
    scanner: Arc<dyn TableScanner>,
    engine: RuleEngine,
}

impl TaskExecutionService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        templates: Arc<dyn TemplateStore>,
        scanner: Arc<dyn TableScanner>,
    ) -> Self {
        Self {
            tasks,
            templates,
            scanner,
            engine: RuleEngine::new(),
        }
    }

    /// Replace the engine, e.g. to pin the reference time in tests.
    pub fn with_engine(mut self, engine: RuleEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn task_store(&self) -> &Arc<dyn TaskStore> {
        &self.tasks
    }

    pub fn template_store(&self) -> &Arc<dyn TemplateStore> {
        &self.templates
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Create an execution for `task_id`, mark the task running and run it.
    ///
    /// Returns the finished execution. Infrastructure failures during the
    /// run are recorded on the execution (status `failed`), not returned.
    /// A failure to persist the outcome is returned, after the execution
    /// and the task have been closed out as `failed` where possible.
    pub async fn start_task(
        &self,
        task_id: &str,
        execution_type: ExecutionType,
        triggered_by: &str,
    ) -> Result<Execution> {
        let task = self.tasks.get_task(task_id).await?;
        let execution = Execution::start(&task.id, execution_type, triggered_by, Utc::now());
        self.tasks.save_execution(&execution).await?;
        if let Err(e) = self
            .tasks
            .update_task(&task.id, TaskUpdate::status(TaskStatus::Running))
            .await
        {
            self.abandon(execution, &e.to_string()).await;
            return Err(e.into());
        }
        self.execute(execution).await
    }

    /// Run a previously created execution to completion.
    pub async fn execute(&self, mut execution: Execution) -> Result<Execution> {
        let started = Instant::now();
        info!(
            task_id = %execution.task_id,
            execution_id = %execution.id,
            execution_type = ?execution.execution_type,
            "execution started"
        );

        match self.scan_and_check(&execution).await {
            Ok(tally) => {
                execution.status = if tally.failed() == 0 {
                    ExecutionStatus::Completed
                } else {
                    ExecutionStatus::CompletedWithIssues
                };
                execution.total_rules_executed = tally.total;
                execution.passed_rules = tally.passed;
                execution.failed_rules = tally.failed();
                execution.issue_count = tally.issues;
                execution.overall_score = quality_score(tally.passed, tally.total);
                execution.execution_results = Some(tally.summary());
            }
            Err(e) => {
                error!(
                    task_id = %execution.task_id,
                    execution_id = %execution.id,
                    error = %e,
                    "execution failed"
                );
                execution.status = ExecutionStatus::Failed;
                execution.error_message = Some(e.to_string());
                execution.total_rules_executed = 0;
                execution.passed_rules = 0;
                execution.failed_rules = 0;
                execution.issue_count = 0;
                execution.overall_score = quality_score(0, 0);
            }
        }

        let finished = Utc::now();
        execution.end_time = Some(finished);
        execution.duration_ms = Some(started.elapsed().as_millis() as i64);
        if let Err(e) = self.persist_outcome(&execution).await {
            error!(
                task_id = %execution.task_id,
                execution_id = %execution.id,
                error = %e,
                "failed to persist execution outcome"
            );
            self.abandon(execution, &e.to_string()).await;
            return Err(e);
        }

        info!(
            task_id = %execution.task_id,
            execution_id = %execution.id,
            status = %execution.status,
            total = execution.total_rules_executed,
            failed = execution.failed_rules,
            score = execution.overall_score,
            duration_ms = execution.duration_ms.unwrap_or_default(),
            "execution finished"
        );
        Ok(execution)
    }

    /// Resolve the templates referenced by `bindings` into a lookup map.
    ///
    /// Missing or disabled templates are left out; the engine reports them.
    pub async fn load_templates(&self, bindings: &[FieldRuleBinding]) -> Result<TemplateMap> {
        let mut map = TemplateMap::new();
        for binding in bindings {
            if map.contains_key(&binding.rule_template_id) {
                continue;
            }
            if let Some(t) = self.templates.get_enabled(&binding.rule_template_id).await? {
                map.insert(t.id.clone(), t);
            }
        }
        Ok(map)
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn persist_outcome(&self, execution: &Execution) -> Result<()> {
        self.tasks.save_execution(execution).await?;
        self.finish_task(execution).await?;
        Ok(())
    }

    /// Best-effort close-out of a run whose bookkeeping failed: the
    /// execution becomes `failed` and the task leaves `running`.
    ///
    /// Task updates are atomic, so a failed `finish_task` recorded nothing
    /// and the run is counted once here.
    async fn abandon(&self, mut execution: Execution, reason: &str) {
        execution.status = ExecutionStatus::Failed;
        execution.error_message = Some(format!("failed to persist execution: {}", reason));
        execution.total_rules_executed = 0;
        execution.passed_rules = 0;
        execution.failed_rules = 0;
        execution.issue_count = 0;
        execution.overall_score = quality_score(0, 0);
        execution.end_time.get_or_insert_with(Utc::now);

        if let Err(e) = self.tasks.save_execution(&execution).await {
            error!(execution_id = %execution.id, error = %e, "failed to mark execution failed");
        }
        if let Err(e) = self.finish_task(&execution).await {
            error!(task_id = %execution.task_id, error = %e, "failed to release task after persistence error");
        }
    }

    /// Update task statistics exactly once for a finished execution.
    ///
    /// A task cancelled while the scan ran keeps its `cancelled` status.
    async fn finish_task(&self, execution: &Execution) -> Result<QualityTask> {
        let current = self.tasks.get_task(&execution.task_id).await?;
        let status = match current.status {
            TaskStatus::Cancelled => None,
            _ => Some(TaskStatus::from(execution.status)),
        };
        let update = TaskUpdate {
            status,
            last_executed: execution.end_time,
            record_run: Some(execution.status),
            ..TaskUpdate::default()
        };
        Ok(self.tasks.update_task(&execution.task_id, update).await?)
    }

    async fn prepare(&self, bindings: Vec<FieldRuleBinding>) -> Result<Vec<PreparedBinding>> {
        let templates = self.load_templates(&bindings).await?;
        Ok(bindings
            .into_iter()
            .map(|binding| {
                let template = templates.get(&binding.rule_template_id).cloned();
                if template.is_none() {
                    warn!(
                        binding_id = %binding.id,
                        template_id = %binding.rule_template_id,
                        "binding references a missing or disabled template"
                    );
                }
                let uniqueness = template
                    .as_ref()
                    .filter(|t| {
                        t.kind == TemplateKind::Quality
                            && t.rule_type == QualityRuleType::Uniqueness.as_str()
                    })
                    .map(|t| EffectiveConfig::merge(t, &binding));
                PreparedBinding {
                    binding,
                    template,
                    uniqueness,
                }
            })
            .collect())
    }

    async fn scan_and_check(&self, execution: &Execution) -> Result<ScanTally> {
        let task = self.tasks.get_task(&execution.task_id).await?;
        let bindings = self.tasks.enabled_bindings(&task.id).await?;
        let mut tally = ScanTally {
            table: format!("{}.{}", task.target_schema, task.target_table),
            ..ScanTally::default()
        };
        if bindings.is_empty() {
            info!(task_id = %task.id, "no enabled bindings, nothing to check");
            return Ok(tally);
        }

        let prepared = self.prepare(bindings).await?;
        tally.per_binding = prepared
            .iter()
            .map(|p| (p.binding.clone(), BindingTally::default()))
            .collect();

        let mut rows = self
            .scanner
            .scan(&task.target_schema, &task.target_table)
            .await?;
        let mut seen: HashMap<(usize, String), HashSet<String>> = HashMap::new();
        let mut pending: Vec<IssueRecord> = Vec::new();

        while let Some(row) = rows.next().await {
            let record = row?;
            tally.rows += 1;
            let identifier = RecordIdentifier::for_row(&record, tally.rows as usize);

            for (idx, p) in prepared.iter().enumerate() {
                for field in p.binding.target_fields() {
                    let key = (idx, field.to_string());
                    let check = self.engine.check_field(
                        p.template.as_ref(),
                        &p.binding,
                        field,
                        &record,
                        seen.get(&key),
                    );
                    if let (Some(config), Some(value)) = (&p.uniqueness, record.get(field)) {
                        if let Some(k) = uniqueness_key(value, config) {
                            seen.entry(key).or_default().insert(k);
                        }
                    }

                    tally.total += 1;
                    tally.per_binding[idx].1.checks += 1;
                    match check {
                        FieldCheck::Passed => tally.passed += 1,
                        FieldCheck::Failed(description) => {
                            tally.per_binding[idx].1.failures += 1;
                            pending.push(make_issue(
                                execution,
                                &p.binding,
                                field,
                                &record,
                                &identifier,
                                description,
                            ));
                        }
                    }
                }
            }

            if pending.len() >= ISSUE_BATCH {
                tally.issues += self.flush_issues(&mut pending).await?;
            }
        }
        tally.issues += self.flush_issues(&mut pending).await?;

        debug!(task_id = %task.id, rows = tally.rows, checks = tally.total, "scan complete");
        Ok(tally)
    }

    async fn flush_issues(&self, pending: &mut Vec<IssueRecord>) -> Result<u64> {
        if pending.is_empty() {
            return Ok(0);
        }
        let batch = std::mem::take(pending);
        let count = batch.len() as u64;
        self.tasks.insert_issues(batch).await?;
        Ok(count)
    }
}

fn make_issue(
    execution: &Execution,
    binding: &FieldRuleBinding,
    field: &str,
    record: &Record,
    identifier: &RecordIdentifier,
    description: String,
) -> IssueRecord {
    IssueRecord {
        id: Uuid::new_v4().to_string(),
        execution_id: execution.id.clone(),
        task_id: execution.task_id.clone(),
        field_name: field.to_string(),
        rule_template_id: binding.rule_template_id.clone(),
        record_identifier: identifier.clone(),
        issue_type: ISSUE_TYPE.to_string(),
        issue_description: description,
        field_value: record.get(field).map(display_value).unwrap_or_default(),
        severity: Severity::from_priority(binding.priority),
        created_at: Utc::now(),
    }
}
