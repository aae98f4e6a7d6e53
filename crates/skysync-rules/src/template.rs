use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::filter::{ExclusionRule, ExclusionRuleDef, ItemFilter};
use crate::rename::{RenameRule, RenameRuleDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Exclusion,
    Rename,
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateKind::Exclusion => write!(f, "exclusion"),
            TemplateKind::Rename => write!(f, "rename"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RuleConfig {
    #[serde(default)]
    rules: Vec<Value>,
}

fn rule_entries(rule_config: &Value) -> Vec<Value> {
    match serde_json::from_value::<RuleConfig>(rule_config.clone()) {
        Ok(config) => config.rules,
        Err(e) => {
            warn!(error = %e, "rule_config is not an object with a rules array; ignoring");
            Vec::new()
        }
    }
}

/// Compile the exclusion rules of a `rule_config` document into a filter.
///
/// Invalid entries are dropped with a warning; an empty result yields an
/// empty (match-nothing) filter.
pub fn compile_exclusions(rule_config: &Value) -> ItemFilter {
    let mut rules = Vec::new();
    for entry in rule_entries(rule_config) {
        let def: ExclusionRuleDef = match serde_json::from_value(entry.clone()) {
            Ok(def) => def,
            Err(e) => {
                warn!(error = %e, rule = %entry, "dropping unparseable exclusion rule");
                continue;
            }
        };
        match ExclusionRule::compile(&def) {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!(error = %e, pattern = %def.pattern, "dropping exclusion rule with bad regex"),
        }
    }
    ItemFilter::new(rules)
}

/// Compile the rename rules of a `rule_config` document, in declared order.
pub fn compile_renames(rule_config: &Value) -> Vec<RenameRule> {
    let mut rules = Vec::new();
    for entry in rule_entries(rule_config) {
        let def: RenameRuleDef = match serde_json::from_value(entry.clone()) {
            Ok(def) => def,
            Err(e) => {
                warn!(error = %e, rule = %entry, "dropping unparseable rename rule");
                continue;
            }
        };
        match RenameRule::compile(&def) {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!(error = %e, regex = %def.match_regex, "dropping rename rule with bad regex"),
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skysync_domain::FileInfo;

    fn file(name: &str) -> FileInfo {
        FileInfo {
            file_id: "1".into(),
            file_name: name.into(),
            file_path: format!("/{name}"),
            is_folder: false,
            file_size: 0,
            parent_id: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
            file_ext: Value::Null,
        }
    }

    #[test]
    fn invalid_entries_are_dropped_not_fatal() {
        let config = json!({
            "rules": [
                {"pattern": ".torrent", "target": "name", "item_type": "file",
                 "mode": "ends_with", "case_sensitive": false},
                {"pattern": "(", "mode": "regex"},          // bad regex
                {"mode": "contains"},                        // missing pattern
                42,                                          // not even an object
            ]
        });
        let filter = compile_exclusions(&config);
        assert!(filter.should_exclude(&file("movie.torrent")));
        assert!(!filter.should_exclude(&file("movie.mkv")));
    }

    #[test]
    fn empty_or_malformed_config_compiles_to_empty_filter() {
        assert!(compile_exclusions(&json!({})).is_empty());
        assert!(compile_exclusions(&json!("nonsense")).is_empty());
    }

    #[test]
    fn rename_rules_keep_declared_order() {
        let config = json!({
            "rules": [
                {"match_regex": "^A", "replace_string": "B"},
                {"match_regex": "^B", "replace_string": "C"},
            ]
        });
        let rules = compile_renames(&config);
        assert_eq!(rules.len(), 2);
        // first matching rule is the caller's contract; confirm order survives
        assert_eq!(rules[0].apply_to_name("Axx"), Some("Bxx".into()));
        assert_eq!(rules[1].apply_to_name("Bxx"), Some("Cxx".into()));
    }
}
