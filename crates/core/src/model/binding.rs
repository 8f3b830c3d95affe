use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::default_true;
use super::template::ConfigMap;

/// Attaches a rule template to a field of a task.
///
/// `runtime_config` and `threshold` override the template's logic, in that
/// order. `extra_fields` lets one binding cover several columns with the
/// same configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRuleBinding {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub task_id: String,
    pub field_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_fields: Vec<String>,
    pub rule_template_id: String,
    #[serde(default)]
    pub runtime_config: ConfigMap,
    #[serde(default)]
    pub threshold: ConfigMap,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_condition: Option<String>,
}

impl FieldRuleBinding {
    pub fn new(field_name: impl Into<String>, rule_template_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            task_id: String::new(),
            field_name: field_name.into(),
            extra_fields: Vec::new(),
            rule_template_id: rule_template_id.into(),
            runtime_config: ConfigMap::new(),
            threshold: ConfigMap::new(),
            priority: 0,
            is_enabled: true,
            pre_condition: None,
            post_condition: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_runtime(mut self, key: &str, value: Value) -> Self {
        self.runtime_config.insert(key.to_string(), value);
        self
    }

    pub fn with_threshold(mut self, key: &str, value: Value) -> Self {
        self.threshold.insert(key.to_string(), value);
        self
    }

    /// Primary field followed by any extra fields.
    pub fn target_fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.field_name.as_str()).chain(self.extra_fields.iter().map(String::as_str))
    }
}

/// Order bindings by priority, highest first. Ties keep their input order.
pub fn sort_by_priority(bindings: &mut [FieldRuleBinding]) {
    bindings.sort_by(|a, b| b.priority.cmp(&a.priority));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_is_descending_and_stable() {
        let mut bindings = vec![
            FieldRuleBinding::new("a", "t").with_priority(10),
            FieldRuleBinding::new("b", "t").with_priority(90),
            FieldRuleBinding::new("c", "t").with_priority(10),
        ];
        sort_by_priority(&mut bindings);
        let order: Vec<_> = bindings.iter().map(|b| b.field_name.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn target_fields_include_extras() {
        let mut binding = FieldRuleBinding::new("phone", "t");
        binding.extra_fields = vec!["mobile".into()];
        assert_eq!(binding.target_fields().collect::<Vec<_>>(), vec!["phone", "mobile"]);
    }

    #[test]
    fn yaml_defaults() {
        let binding: FieldRuleBinding =
            serde_json::from_str(r#"{"field_name":"email","rule_template_id":"tpl"}"#).unwrap();
        assert!(binding.is_enabled);
        assert_eq!(binding.priority, 0);
        assert!(binding.runtime_config.is_empty());
    }
}
