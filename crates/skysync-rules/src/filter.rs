use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use skysync_domain::FileInfo;

// ── Rule vocabulary ───────────────────────────────────────────────────────────

/// Which attribute of an item a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTarget {
    Name,
    Path,
    Extension,
}

/// Which item shapes a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Contains,
    StartsWith,
    EndsWith,
    Exact,
    Regex,
}

// ── Exclusion ─────────────────────────────────────────────────────────────────

/// Declarative form of one exclusion rule, as stored in `rule_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionRuleDef {
    pub pattern: String,
    #[serde(default = "default_target")]
    pub target: MatchTarget,
    #[serde(default = "default_item_type")]
    pub item_type: ItemKind,
    #[serde(default = "default_mode")]
    pub mode: MatchMode,
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_target() -> MatchTarget {
    MatchTarget::Name
}

fn default_item_type() -> ItemKind {
    ItemKind::Any
}

fn default_mode() -> MatchMode {
    MatchMode::Contains
}

/// A compiled exclusion rule. Regex patterns are compiled once at load time.
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    pattern: String,
    target: MatchTarget,
    item_type: ItemKind,
    mode: MatchMode,
    case_sensitive: bool,
    regex: Option<Regex>,
}

impl ExclusionRule {
    pub fn compile(def: &ExclusionRuleDef) -> Result<Self, regex::Error> {
        let regex = match def.mode {
            MatchMode::Regex => Some(
                RegexBuilder::new(&def.pattern)
                    .case_insensitive(!def.case_sensitive)
                    .build()?,
            ),
            _ => None,
        };
        Ok(Self {
            pattern: def.pattern.clone(),
            target: def.target,
            item_type: def.item_type,
            mode: def.mode,
            case_sensitive: def.case_sensitive,
            regex,
        })
    }

    fn value_of<'a>(&self, item: &'a FileInfo) -> Option<&'a str> {
        match self.target {
            MatchTarget::Name => Some(&item.file_name),
            MatchTarget::Path => Some(&item.file_path),
            MatchTarget::Extension => item
                .file_name
                .rsplit_once('.')
                .map(|(_, ext)| ext)
                .filter(|ext| !ext.is_empty()),
        }
    }

    pub fn matches(&self, item: &FileInfo) -> bool {
        match self.item_type {
            ItemKind::File if item.is_folder => return false,
            ItemKind::Folder if !item.is_folder => return false,
            _ => {}
        }

        let Some(value) = self.value_of(item) else {
            return false;
        };

        if let Some(regex) = &self.regex {
            return regex.is_match(value);
        }

        let (value, pattern) = if self.case_sensitive {
            (value.to_string(), self.pattern.clone())
        } else {
            (value.to_lowercase(), self.pattern.to_lowercase())
        };

        match self.mode {
            MatchMode::Contains => value.contains(&pattern),
            MatchMode::StartsWith => value.starts_with(&pattern),
            MatchMode::EndsWith => value.ends_with(&pattern),
            MatchMode::Exact => value == pattern,
            MatchMode::Regex => false,
        }
    }
}

/// Ordered exclusion predicates; the first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    rules: Vec<ExclusionRule>,
}

impl ItemFilter {
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn should_exclude(&self, item: &FileInfo) -> bool {
        self.rules.iter().any(|rule| rule.matches(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, path: &str) -> FileInfo {
        FileInfo {
            file_id: "1".into(),
            file_name: name.into(),
            file_path: path.into(),
            is_folder: false,
            file_size: 1,
            parent_id: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
            file_ext: serde_json::Value::Null,
        }
    }

    fn folder(name: &str) -> FileInfo {
        FileInfo {
            is_folder: true,
            ..file(name, &format!("/{name}"))
        }
    }

    fn rule(def: ExclusionRuleDef) -> ExclusionRule {
        ExclusionRule::compile(&def).unwrap()
    }

    #[test]
    fn contains_is_case_insensitive_by_default() {
        let r = rule(ExclusionRuleDef {
            pattern: "TRAILER".into(),
            target: MatchTarget::Name,
            item_type: ItemKind::Any,
            mode: MatchMode::Contains,
            case_sensitive: false,
        });
        assert!(r.matches(&file("movie-trailer.mp4", "/movie-trailer.mp4")));

        let strict = rule(ExclusionRuleDef {
            case_sensitive: true,
            pattern: "TRAILER".into(),
            target: MatchTarget::Name,
            item_type: ItemKind::Any,
            mode: MatchMode::Contains,
        });
        assert!(!strict.matches(&file("movie-trailer.mp4", "/movie-trailer.mp4")));
    }

    #[test]
    fn item_type_gates_folder_ness() {
        let folders_only = rule(ExclusionRuleDef {
            pattern: "tmp".into(),
            target: MatchTarget::Name,
            item_type: ItemKind::Folder,
            mode: MatchMode::Exact,
            case_sensitive: false,
        });
        assert!(folders_only.matches(&folder("tmp")));
        assert!(!folders_only.matches(&file("tmp", "/tmp")));
    }

    #[test]
    fn extension_target_takes_text_after_final_dot() {
        let r = rule(ExclusionRuleDef {
            pattern: "iso".into(),
            target: MatchTarget::Extension,
            item_type: ItemKind::File,
            mode: MatchMode::Exact,
            case_sensitive: false,
        });
        assert!(r.matches(&file("disk.backup.ISO", "/disk.backup.ISO")));
        assert!(!r.matches(&file("iso", "/iso")));
    }

    #[test]
    fn regex_mode_precompiles_and_searches() {
        let r = rule(ExclusionRuleDef {
            pattern: r"^ep\d{2}-raw".into(),
            target: MatchTarget::Name,
            item_type: ItemKind::Any,
            mode: MatchMode::Regex,
            case_sensitive: false,
        });
        assert!(r.matches(&file("EP03-raw.mkv", "/EP03-raw.mkv")));
        assert!(!r.matches(&file("ep3-raw.mkv", "/ep3-raw.mkv")));
    }

    #[test]
    fn first_match_wins_across_rules() {
        let filter = ItemFilter::new(vec![
            rule(ExclusionRuleDef {
                pattern: ".nfo".into(),
                target: MatchTarget::Name,
                item_type: ItemKind::File,
                mode: MatchMode::EndsWith,
                case_sensitive: false,
            }),
            rule(ExclusionRuleDef {
                pattern: "/private/".into(),
                target: MatchTarget::Path,
                item_type: ItemKind::Any,
                mode: MatchMode::Contains,
                case_sensitive: false,
            }),
        ]);
        assert!(filter.should_exclude(&file("info.nfo", "/pub/info.nfo")));
        assert!(filter.should_exclude(&file("a.mkv", "/private/a.mkv")));
        assert!(!filter.should_exclude(&file("a.mkv", "/pub/a.mkv")));
    }
}
