//! Rule engine: applies bindings and templates to one record.
//!
//! The engine holds no mutable state. Evaluating the same record with the
//! same bindings and templates (and the same reference time) always yields
//! the same outcome. Per-field problems become issue strings; nothing in
//! here aborts a batch.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use steward_core::{quality_score, FieldRuleBinding, Record, RuleTemplate, TemplateKind};
use tracing::debug;

use crate::cleansing::apply_cleansing;
use crate::condition;
use crate::config::EffectiveConfig;
use crate::masking::apply_masking;
use crate::quality::{run_check, CheckInput};

/// Templates available to an evaluation, keyed by template ID.
pub type TemplateMap = HashMap<String, RuleTemplate>;

/// Before/after values of a field changed by masking or cleansing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modification {
    pub original: Value,
    pub updated: Value,
    /// Rule type that produced `updated`.
    pub rule: String,
}

/// Result of evaluating one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub processed: Record,
    pub issues: Vec<String>,
    pub modifications: IndexMap<String, Modification>,
    /// `"<rule type>:<field>"` for every rule that ran.
    pub rules_applied: Vec<String>,
    /// Quality mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    pub total_checks: u64,
    pub passed_checks: u64,
}

impl RuleOutcome {
    fn new(record: &Record) -> Self {
        Self {
            processed: record.clone(),
            issues: Vec::new(),
            modifications: IndexMap::new(),
            rules_applied: Vec::new(),
            quality_score: None,
            total_checks: 0,
            passed_checks: 0,
        }
    }

    pub fn failed_checks(&self) -> u64 {
        self.total_checks - self.passed_checks
    }

    fn record_change(&mut self, field: &str, original: Value, updated: Value, rule: &str) {
        self.processed.insert(field.to_string(), updated.clone());
        self.rules_applied.push(format!("{}:{}", rule, field));
        if original == updated {
            return;
        }
        self.modifications
            .entry(field.to_string())
            .and_modify(|m| {
                m.updated = updated.clone();
                m.rule = rule.to_string();
            })
            .or_insert(Modification {
                original,
                updated,
                rule: rule.to_string(),
            });
    }
}

/// Outcome of one quality check on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldCheck {
    Passed,
    Failed(String),
}

impl FieldCheck {
    pub fn is_passed(&self) -> bool {
        matches!(self, FieldCheck::Passed)
    }
}

// ── Rule engine ─────────────────────────────────────────────────────

/// Evaluates records against field bindings in quality, masking or
/// cleansing mode.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    reference_time: Option<DateTime<Utc>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose age-based checks measure against `reference_time`
    /// instead of the wall clock.
    pub fn at(reference_time: DateTime<Utc>) -> Self {
        Self {
            reference_time: Some(reference_time),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.reference_time.unwrap_or_else(Utc::now)
    }

    /// Run every enabled binding's quality check over its target fields.
    ///
    /// Each target field counts as one check. A missing template or a
    /// missing field counts as a failed check and yields an issue.
    pub fn evaluate_quality(
        &self,
        record: &Record,
        bindings: &[FieldRuleBinding],
        templates: &TemplateMap,
    ) -> RuleOutcome {
        let mut outcome = RuleOutcome::new(record);
        let now = self.now();

        for binding in bindings.iter().filter(|b| b.is_enabled) {
            let template = resolve(templates, binding, TemplateKind::Quality);
            for field in binding.target_fields() {
                outcome.total_checks += 1;
                let check = match &template {
                    Ok(t) => {
                        let check = check_with(t, binding, field, record, now, None);
                        if record.contains_key(field) {
                            outcome.rules_applied.push(format!("{}:{}", t.rule_type, field));
                        }
                        check
                    }
                    Err(reason) => FieldCheck::Failed(format!("field {}: {}", field, reason)),
                };
                match check {
                    FieldCheck::Passed => outcome.passed_checks += 1,
                    FieldCheck::Failed(issue) => outcome.issues.push(issue),
                }
            }
        }

        outcome.quality_score = Some(quality_score(outcome.passed_checks, outcome.total_checks));
        outcome
    }

    /// Single quality check of `field` under `binding`.
    ///
    /// `template` is the binding's template as looked up by the caller
    /// (`None` if it does not exist or is disabled). `seen` holds values
    /// already observed for this binding and field, for uniqueness.
    pub fn check_field(
        &self,
        template: Option<&RuleTemplate>,
        binding: &FieldRuleBinding,
        field: &str,
        record: &Record,
        seen: Option<&HashSet<String>>,
    ) -> FieldCheck {
        match validate_template(template, binding, TemplateKind::Quality) {
            Ok(t) => check_with(t, binding, field, record, self.now(), seen),
            Err(reason) => FieldCheck::Failed(format!("field {}: {}", field, reason)),
        }
    }

    /// Apply masking bindings. `pre_condition` acts as the apply condition.
    pub fn evaluate_masking(
        &self,
        record: &Record,
        bindings: &[FieldRuleBinding],
        templates: &TemplateMap,
    ) -> RuleOutcome {
        let mut outcome = RuleOutcome::new(record);

        for binding in bindings.iter().filter(|b| b.is_enabled) {
            let template = match resolve(templates, binding, TemplateKind::Masking) {
                Ok(t) => t,
                Err(reason) => {
                    push_per_field(&mut outcome, binding, &reason);
                    continue;
                }
            };
            if !precondition_holds(binding, &outcome.processed) {
                continue;
            }
            let config = EffectiveConfig::merge(template, binding);

            for field in binding.target_fields() {
                let Some(original) = outcome.processed.get(field).cloned() else {
                    outcome.issues.push(missing_field(field));
                    continue;
                };
                match apply_masking(&template.rule_type, field, &original, &config) {
                    Ok(masked) => outcome.record_change(field, original, masked, &template.rule_type),
                    Err(e) => outcome.issues.push(e.to_string()),
                }
            }
        }

        outcome
    }

    /// Apply cleansing bindings with pre- and post-conditions.
    ///
    /// A false pre-condition skips the binding. A false post-condition adds
    /// an issue but keeps the transformed values.
    pub fn evaluate_cleansing(
        &self,
        record: &Record,
        bindings: &[FieldRuleBinding],
        templates: &TemplateMap,
    ) -> RuleOutcome {
        let mut outcome = RuleOutcome::new(record);

        for binding in bindings.iter().filter(|b| b.is_enabled) {
            let template = match resolve(templates, binding, TemplateKind::Cleansing) {
                Ok(t) => t,
                Err(reason) => {
                    push_per_field(&mut outcome, binding, &reason);
                    continue;
                }
            };
            if !precondition_holds(binding, &outcome.processed) {
                continue;
            }
            let config = EffectiveConfig::merge(template, binding);

            for field in binding.target_fields() {
                let Some(original) = outcome.processed.get(field).cloned() else {
                    outcome.issues.push(missing_field(field));
                    continue;
                };
                match apply_cleansing(&template.rule_type, field, &original, &config) {
                    Ok(cleaned) => outcome.record_change(field, original, cleaned, &template.rule_type),
                    Err(e) => outcome.issues.push(e.to_string()),
                }
            }

            if let Some(post) = binding.post_condition.as_deref() {
                if !condition::evaluate(post, &outcome.processed) {
                    outcome.issues.push(format!("post-condition not met: {}", post));
                }
            }
        }

        outcome
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn resolve<'t>(
    templates: &'t TemplateMap,
    binding: &FieldRuleBinding,
    kind: TemplateKind,
) -> Result<&'t RuleTemplate, String> {
    validate_template(templates.get(&binding.rule_template_id), binding, kind)
}

fn validate_template<'t>(
    template: Option<&'t RuleTemplate>,
    binding: &FieldRuleBinding,
    kind: TemplateKind,
) -> Result<&'t RuleTemplate, String> {
    match template {
        Some(t) if !t.is_enabled => Err(format!("rule template {} is disabled", t.id)),
        Some(t) if t.kind != kind => Err(format!(
            "rule template {} is a {} template, expected {}",
            t.id, t.kind, kind
        )),
        Some(t) => Ok(t),
        None => Err(format!("rule template {} not found", binding.rule_template_id)),
    }
}

fn check_with(
    template: &RuleTemplate,
    binding: &FieldRuleBinding,
    field: &str,
    record: &Record,
    now: DateTime<Utc>,
    seen: Option<&HashSet<String>>,
) -> FieldCheck {
    let Some(value) = record.get(field) else {
        return FieldCheck::Failed(missing_field(field));
    };
    let config = EffectiveConfig::merge(template, binding);
    let input = CheckInput {
        field,
        value,
        record,
        config: &config,
        now,
        seen,
    };
    match run_check(&template.rule_type, &input) {
        Ok(()) => FieldCheck::Passed,
        Err(issue) => FieldCheck::Failed(issue),
    }
}

fn precondition_holds(binding: &FieldRuleBinding, record: &Record) -> bool {
    match binding.pre_condition.as_deref() {
        Some(cond) if !condition::evaluate(cond, record) => {
            debug!(binding_id = %binding.id, condition = %cond, "pre-condition false, binding skipped");
            false
        }
        _ => true,
    }
}

fn push_per_field(outcome: &mut RuleOutcome, binding: &FieldRuleBinding, reason: &str) {
    for field in binding.target_fields() {
        outcome.issues.push(format!("field {}: {}", field, reason));
    }
}

fn missing_field(field: &str) -> String {
    format!("field {} is not present in the record", field)
}
