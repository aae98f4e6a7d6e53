//! Compilation of stored rule templates into runtime predicates.
//!
//! A rule template stores its rules as JSON (`rule_config = {"rules": [...]}`).
//! Exclusion templates compile into an [`ItemFilter`]; rename templates into a
//! list of [`RenameRule`]s. Entries that fail to parse (unknown enum value,
//! bad regex) are dropped with a warning rather than aborting compilation.

pub mod filter;
pub mod rename;
pub mod template;

pub use filter::{ExclusionRule, ExclusionRuleDef, ItemFilter, ItemKind, MatchMode, MatchTarget};
pub use rename::{RenameRule, RenameRuleDef};
pub use template::{compile_exclusions, compile_renames, TemplateKind};
