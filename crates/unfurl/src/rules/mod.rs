// ABOUTME: Declarative rule model: Strategy, FieldRule, ValueKind and the validated RuleSet.
// ABOUTME: A rule set maps each output field to an ordered list of extraction strategies.

//! Rule definitions for metadata extraction.
//!
//! Each output field owns an ordered list of [`Strategy`] values. Order is
//! precedence: the engine stops at the first strategy that produces a
//! non-empty value. Rule sets are plain data (serde) so the built-in table
//! can be embedded as JSON and replaced by a user file.

pub mod loader;

use serde::{Deserialize, Serialize};

use crate::error::RuleSetError;

/// Keys the engine injects after extraction; rules may not claim them.
pub const RESERVED_FIELDS: &[&str] = &["link", "domain", "type", "cleaned_url", "originalOGImage"];

/// One way of pulling a value out of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// `<meta name="..." content="...">`
    MetaName { name: String },
    /// `<meta property="..." content="...">`
    MetaProperty { property: String },
    /// First element matching `css`; its text, or `attr` when given.
    Selector {
        css: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attr: Option<String>,
    },
    /// A fixed value, typically a last-resort default.
    Constant { value: String },
    /// A built-in function over the whole document.
    Computed { function: Computed },
}

impl Strategy {
    pub fn meta_name(name: impl Into<String>) -> Self {
        Strategy::MetaName { name: name.into() }
    }

    pub fn meta_property(property: impl Into<String>) -> Self {
        Strategy::MetaProperty {
            property: property.into(),
        }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Strategy::Selector {
            css: css.into(),
            attr: None,
        }
    }

    pub fn css_attr(css: impl Into<String>, attr: impl Into<String>) -> Self {
        Strategy::Selector {
            css: css.into(),
            attr: Some(attr.into()),
        }
    }

    pub fn constant(value: impl Into<String>) -> Self {
        Strategy::Constant {
            value: value.into(),
        }
    }

    pub fn computed(function: Computed) -> Self {
        Strategy::Computed { function }
    }
}

/// Built-in document functions available to `Strategy::Computed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Computed {
    /// First reasonably long paragraph, truncated.
    FirstParagraph,
    /// Icon link with the largest declared size.
    LargestIcon,
    /// RSS/Atom/JSON feed advertised by the page.
    FeedUrl,
}

/// Field-level coercion applied to the winning raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Text,
    /// Absolutized against the page origin during finalization.
    Url,
    Number,
    Boolean,
    /// Normalized to RFC 3339 when parseable.
    Date,
    /// Comma-separated list.
    List,
    /// Raw JSON text, parsed during finalization.
    JsonLd,
}

/// Ordered strategies for a single output field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: String,
    #[serde(default)]
    pub kind: ValueKind,
    pub strategies: Vec<Strategy>,
}

impl FieldRule {
    pub fn new(field: impl Into<String>, kind: ValueKind, strategies: Vec<Strategy>) -> Self {
        Self {
            field: field.into(),
            kind,
            strategies,
        }
    }
}

/// A validated, immutable collection of field rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<FieldRule>,
}

impl RuleSet {
    /// Validates and builds a rule set.
    ///
    /// Field names must be non-empty, unique and not reserved; every rule
    /// needs at least one strategy.
    pub fn new(rules: Vec<FieldRule>) -> Result<Self, RuleSetError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &rules {
            let name = rule.field.trim();
            if name.is_empty() {
                return Err(RuleSetError::EmptyFieldName);
            }
            if RESERVED_FIELDS.contains(&name) {
                return Err(RuleSetError::ReservedField(name.to_string()));
            }
            if !seen.insert(name) {
                return Err(RuleSetError::DuplicateField(name.to_string()));
            }
            if rule.strategies.is_empty() {
                return Err(RuleSetError::NoStrategies(name.to_string()));
            }
        }
        Ok(Self { rules })
    }

    /// Rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldRule> {
        self.rules.iter()
    }

    pub fn get(&self, field: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.field == field)
    }

    /// Kind of `field`, if configured.
    pub fn kind_of(&self, field: &str) -> Option<ValueKind> {
        self.get(field).map(|r| r.kind)
    }

    /// Every CSS selector referenced by the rules.
    pub fn selectors(&self) -> Vec<&str> {
        self.rules
            .iter()
            .flat_map(|r| r.strategies.iter())
            .filter_map(|s| match s {
                Strategy::Selector { css, .. } => Some(css.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
