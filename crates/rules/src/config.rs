//! Layered rule configuration.
//!
//! The effective configuration of a binding is built from, lowest to
//! highest precedence: the template's `default_config`, its `rule_logic`,
//! the binding's `runtime_config`, then the binding's `threshold`. Later
//! layers win on key conflicts.

use serde_json::Value;
use steward_core::{ConfigMap, FieldRuleBinding, RuleTemplate};

/// Merged key/value configuration with typed accessors.
///
/// Accessors return `None` (or the supplied default) when a key is absent
/// or holds a value of the wrong JSON type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveConfig {
    values: ConfigMap,
}

impl EffectiveConfig {
    /// Merge layers in order; later layers override earlier ones.
    pub fn from_layers<'a>(layers: impl IntoIterator<Item = &'a ConfigMap>) -> Self {
        let mut values = ConfigMap::new();
        for layer in layers {
            for (k, v) in layer {
                values.insert(k.clone(), v.clone());
            }
        }
        Self { values }
    }

    /// Effective config of `binding` applied through `template`.
    pub fn merge(template: &RuleTemplate, binding: &FieldRuleBinding) -> Self {
        Self::from_layers([
            &template.default_config,
            &template.rule_logic,
            &binding.runtime_config,
            &binding.threshold,
        ])
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.str(key).unwrap_or(default)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    /// Non-negative integer; fractional numbers are truncated.
    pub fn usize(&self, key: &str) -> Option<usize> {
        self.f64(key).filter(|n| *n >= 0.0).map(|n| n as usize)
    }

    pub fn usize_or(&self, key: &str, default: usize) -> usize {
        self.usize(key).unwrap_or(default)
    }

    pub fn array(&self, key: &str) -> Option<&Vec<Value>> {
        self.values.get(key).and_then(Value::as_array)
    }
}
