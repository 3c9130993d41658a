// ABOUTME: Loads rule sets from the embedded default table or from a user-supplied JSON file.
// ABOUTME: Validates the rules and warms the selector cache before the set is shared.

//! Rule set loader.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::document::compiled::precompile_selectors;
use crate::error::RuleSetError;
use crate::rules::{FieldRule, RuleSet};

/// Embedded JSON containing the default field rules.
const BUILTIN_RULES_JSON: &str = include_str!("../../data/rules.json");

/// Parses and validates a JSON array of field rules.
pub fn parse_rules(json: &str) -> Result<RuleSet, RuleSetError> {
    let rules: Vec<FieldRule> = serde_json::from_str(json)?;
    let set = RuleSet::new(rules)?;

    let invalid = precompile_selectors(set.selectors());
    for css in &invalid {
        warn!(selector = %css, "rule selector does not compile and will never match");
    }
    debug!(fields = set.len(), "rule set loaded");
    Ok(set)
}

/// Loads a rule set from a JSON file on disk.
pub fn load_rules_from_path(path: impl AsRef<Path>) -> Result<RuleSet, RuleSetError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| RuleSetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_rules(&json)
}

/// Loads the built-in rule set.
///
/// # Panics
///
/// Panics if the embedded JSON is malformed; the table ships with the crate
/// and is covered by tests.
pub fn load_builtin_rules() -> RuleSet {
    parse_rules(BUILTIN_RULES_JSON).expect("failed to parse builtin rules")
}
