// ABOUTME: Field-level coercion of raw extracted strings into typed values per ValueKind.
// ABOUTME: Handles numbers, booleans, comma lists and loose date normalization to RFC 3339.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};

use crate::result::FieldValue;
use crate::rules::ValueKind;

/// Converts a winning raw value into the field's typed form.
///
/// Returns `None` when the value cannot be represented in the requested kind
/// (a non-numeric `Number`, an unrecognized `Boolean`, an empty `List`).
/// Dates that cannot be parsed keep their raw text.
pub fn coerce(raw: &str, kind: ValueKind) -> Option<FieldValue> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match kind {
        ValueKind::Text | ValueKind::Url | ValueKind::JsonLd => Some(FieldValue::from(raw)),
        ValueKind::Number => parse_number(raw).map(|n| FieldValue::Json(Value::Number(n))),
        ValueKind::Boolean => parse_bool(raw).map(|b| FieldValue::Json(Value::Bool(b))),
        ValueKind::Date => Some(FieldValue::Text(
            parse_date(raw)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_else(|| raw.to_string()),
        )),
        ValueKind::List => {
            let items = split_list(raw);
            (!items.is_empty()).then_some(FieldValue::List(items))
        }
    }
}

fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Splits on commas, trimming and dropping empties and repeats.
fn split_list(s: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if !part.is_empty() && !items.iter().any(|i| i == part) {
            items.push(part.to_string());
        }
    }
    items
}

/// Parses a date string, trying RFC 3339 first, then loose date-only
/// patterns, then `dateparser`.
pub(crate) fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // Date-only forms are pinned to midnight UTC so the day never shifts
    // with the local timezone.
    const LOOSE_PATTERNS: &[&str] = &[
        "%Y-%m-%d",
        "%b %e, %Y",
        "%e %b %Y",
        "%b %d, %Y",
        "%d %b %Y",
        "%B %e, %Y",
        "%e %B %Y",
        "%B %d, %Y",
        "%d %B %Y",
    ];
    for pat in LOOSE_PATTERNS {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(s.trim(), pat) {
            let naive_dt = date.and_hms_opt(0, 0, 0)?;
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(naive_dt, Utc));
        }
    }

    dateparser::parse(s).ok().map(|dt| dt.with_timezone(&Utc))
}
