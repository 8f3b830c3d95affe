//! Built-in template catalog, compiled into the binary from
//! `templates/builtin.yaml`.

use steward_core::RuleTemplate;
use tracing::warn;

use crate::engine::TemplateMap;
use crate::error::{Result, RuleError};
use crate::validation::validate_template;

const CATALOG: &str = include_str!("../templates/builtin.yaml");

/// Parse the built-in catalog. Every entry is marked built-in and must pass
/// [`validate_template`].
pub fn builtin_templates() -> Result<Vec<RuleTemplate>> {
    parse_catalog(CATALOG)
}

/// Built-in templates keyed by ID.
pub fn builtin_template_map() -> Result<TemplateMap> {
    Ok(builtin_templates()?
        .into_iter()
        .map(|t| (t.id.clone(), t))
        .collect())
}

pub(crate) fn parse_catalog(yaml: &str) -> Result<Vec<RuleTemplate>> {
    let mut templates: Vec<RuleTemplate> = serde_yaml::from_str(yaml)?;
    for template in &mut templates {
        template.is_built_in = true;
        let result = validate_template(template);
        if !result.valid {
            return Err(RuleError::Validation(format!(
                "built-in template {}: {}",
                template.id,
                result.summary()
            )));
        }
        for w in &result.warnings {
            warn!(template = %template.id, path = %w.path, "{}", w.message);
        }
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::TemplateKind;

    #[test]
    fn catalog_parses_and_validates() {
        let templates = builtin_templates().unwrap();
        assert_eq!(templates.len(), 16);
        assert!(templates.iter().all(|t| t.is_built_in && t.is_enabled));

        let count = |kind| templates.iter().filter(|t| t.kind == kind).count();
        assert_eq!(count(TemplateKind::Quality), 7);
        assert_eq!(count(TemplateKind::Masking), 4);
        assert_eq!(count(TemplateKind::Cleansing), 5);
    }

    #[test]
    fn well_known_ids_present() {
        let map = builtin_template_map().unwrap();
        for id in [
            "completeness_template_001",
            "accuracy_template_001",
            "masking_template_001",
            "cleansing_template_005",
        ] {
            assert!(map.contains_key(id), "missing {id}");
        }
        assert_eq!(map["timeliness_template_001"].rule_logic["max_age_days"], 30);
    }

    #[test]
    fn invalid_catalog_is_rejected() {
        let yaml = "- id: bad\n  kind: quality\n  type: completenes\n";
        let err = parse_catalog(yaml).unwrap_err();
        assert!(err.to_string().contains("did you mean 'completeness'"));

        assert!(matches!(parse_catalog("not: [a list"), Err(RuleError::Parse(_))));
    }
}
