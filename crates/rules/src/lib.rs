//! Rule evaluation for data-quality governance.
//!
//! This crate provides:
//! - Quality checks (completeness, accuracy, consistency, validity,
//!   uniqueness, timeliness, standardization)
//! - Masking and cleansing transforms
//! - The condition mini-grammar used by binding pre/post-conditions
//! - [`RuleEngine`], which applies bindings to one record at a time
//! - The built-in template catalog and template/binding validation

pub mod builtin;
pub mod cleansing;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod masking;
pub mod quality;
mod text;
pub mod validation;

pub use builtin::{builtin_template_map, builtin_templates};
pub use config::EffectiveConfig;
pub use engine::{FieldCheck, Modification, RuleEngine, RuleOutcome, TemplateMap};
pub use error::{Result, RuleError};
pub use quality::uniqueness_key;
pub use validation::{validate_binding, validate_task, validate_template, ValidationResult};
