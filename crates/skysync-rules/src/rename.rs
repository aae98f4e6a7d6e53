use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use skysync_domain::FileInfo;

use crate::filter::MatchTarget;

/// Declarative form of one rename rule, as stored in `rule_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRuleDef {
    pub match_regex: String,
    pub replace_string: String,
    #[serde(default = "default_scope")]
    pub target_scope: MatchTarget,
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_scope() -> MatchTarget {
    MatchTarget::Name
}

/// A compiled regex-substitution rename.
///
/// Renames are advisory: providers in scope cannot rename during a server-side
/// copy, so the engine only uses them as a pre-comparison transform on names.
#[derive(Debug, Clone)]
pub struct RenameRule {
    replace_string: String,
    target_scope: MatchTarget,
    regex: Regex,
}

impl RenameRule {
    pub fn compile(def: &RenameRuleDef) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&def.match_regex)
            .case_insensitive(!def.case_sensitive)
            .build()?;
        Ok(Self {
            replace_string: def.replace_string.clone(),
            target_scope: def.target_scope,
            regex,
        })
    }

    pub fn scope(&self) -> MatchTarget {
        self.target_scope
    }

    /// Substitute against the rule's scope. Returns `None` when nothing changed.
    pub fn apply(&self, item: &FileInfo) -> Option<String> {
        let original = match self.target_scope {
            MatchTarget::Name => item.file_name.as_str(),
            MatchTarget::Path => item.file_path.as_str(),
            MatchTarget::Extension => return None,
        };
        if original.is_empty() {
            return None;
        }
        let renamed = self.regex.replace_all(original, self.replace_string.as_str());
        if renamed == original {
            None
        } else {
            Some(renamed.into_owned())
        }
    }

    /// Substitute against a bare name, independent of any `FileInfo`.
    pub fn apply_to_name(&self, name: &str) -> Option<String> {
        if self.target_scope != MatchTarget::Name || name.is_empty() {
            return None;
        }
        let renamed = self.regex.replace_all(name, self.replace_string.as_str());
        if renamed == name {
            None
        } else {
            Some(renamed.into_owned())
        }
    }
}
