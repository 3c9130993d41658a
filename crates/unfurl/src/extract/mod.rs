// ABOUTME: The extraction engine: walks each field's strategies in order and keeps the first hit.
// ABOUTME: Also runs the fixed cross-field post-processing (link, domain, URLs, type, JSON-LD).

//! Rule-driven metadata extraction.
//!
//! Extraction is split in two phases:
//! - [`extract`] evaluates every field rule against a parsed document. For a
//!   field, strategies are tried in order and the first one producing a
//!   non-empty trimmed value wins; its raw value is then coerced per the
//!   rule's [`ValueKind`]. Fields with no winning strategy are omitted.
//! - [`finalize`] applies cross-field post-processing in a fixed order:
//!   `link`, `domain`, URL absolutization, `type`, JSON-LD parsing.
//!
//! The repository image lookup performs I/O and runs afterwards in the
//! client pipeline.

pub mod coerce;
pub mod computed;

use tracing::{trace, warn};
use url::Url;

use crate::classify::classify;
use crate::document::{MetaKey, ParsedDocument};
use crate::error::FieldError;
use crate::result::{ExtractionResult, FieldValue};
use crate::rules::{FieldRule, RuleSet, Strategy, ValueKind};

/// Evaluates a single strategy, returning its trimmed value when non-empty.
pub fn evaluate(doc: &ParsedDocument, strategy: &Strategy, kind: ValueKind) -> Option<String> {
    let raw = match strategy {
        Strategy::MetaName { name } => doc.meta_content(name, MetaKey::Name),
        Strategy::MetaProperty { property } => doc.meta_content(property, MetaKey::Property),
        Strategy::Selector {
            css,
            attr: Some(attr),
        } => doc.first_attr(css, attr),
        Strategy::Selector { css, attr: None } if kind == ValueKind::JsonLd => {
            doc.first_raw_text(css)
        }
        Strategy::Selector { css, attr: None } => doc.first_text(css),
        Strategy::Constant { value } => Some(value.clone()),
        Strategy::Computed { function } => computed::evaluate(*function, doc),
    }?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Extracts one field: first accepted strategy, then coercion.
pub fn extract_field(doc: &ParsedDocument, rule: &FieldRule) -> Option<FieldValue> {
    let (index, raw) = rule
        .strategies
        .iter()
        .enumerate()
        .find_map(|(i, s)| evaluate(doc, s, rule.kind).map(|v| (i, v)))?;
    trace!(field = %rule.field, strategy = index, "field resolved");
    coerce::coerce(&raw, rule.kind)
}

/// Extracts every field in `rules` from `doc`.
pub fn extract(doc: &ParsedDocument, rules: &RuleSet) -> ExtractionResult {
    let mut result = ExtractionResult::new();
    for rule in rules.iter() {
        if let Some(value) = extract_field(doc, rule) {
            result.set(rule.field.clone(), value);
        }
    }
    result
}

/// URLs the finalization step needs.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    /// The URL the caller asked for (after normalization and host rewrites).
    pub requested_url: &'a str,
    /// The URL the page was actually served from, after redirects.
    pub final_url: &'a str,
}

/// Origin (`scheme://host[:port]`) of `url`, if it has a non-opaque one.
pub fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Resolves a scheme-less reference against `origin`. Values that already
/// carry a scheme are returned unchanged.
pub fn absolutize(value: &str, origin: &str) -> String {
    if Url::parse(value).is_ok() {
        return value.to_string();
    }
    Url::parse(origin)
        .and_then(|base| base.join(value))
        .map(String::from)
        .unwrap_or_else(|_| value.to_string())
}

/// Applies cross-field post-processing in its fixed order.
pub fn finalize(result: &mut ExtractionResult, rules: &RuleSet, ctx: &FinalizeContext<'_>) {
    result.set("link", ctx.final_url);

    let origin = origin_of(ctx.final_url);
    if let Some(ref origin) = origin {
        result.set("domain", origin.as_str());
    }

    if let Some(ref origin) = origin {
        for rule in rules.iter().filter(|r| r.kind == ValueKind::Url) {
            result.update(&rule.field, |value| match value {
                FieldValue::Text(s) => FieldValue::Text(absolutize(&s, origin)),
                other => other,
            });
        }
    }

    result.set("type", classify(ctx.requested_url, false).as_str());

    for rule in rules.iter().filter(|r| r.kind == ValueKind::JsonLd) {
        let Some(raw) = result.get_str(&rule.field).map(str::to_string) else {
            continue;
        };
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(parsed) => result.update(&rule.field, |_| FieldValue::Json(parsed)),
            Err(e) => {
                warn!(field = %rule.field, url = %ctx.final_url, error = %e, "embedded JSON-LD did not parse");
                result.fail(&rule.field, FieldError::MalformedJsonLd(e.to_string()));
            }
        }
    }
}
