// ABOUTME: ExtractionResult, the per-request field map, and FieldValue, the value of one field.
// ABOUTME: Fields are set at most once; per-field failures are kept beside the map, not in it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::FieldError;

/// The value of one extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Json(serde_json::Value),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Field map produced for one request.
///
/// Serializes as a flat JSON object of the fields only; `errors` is
/// available to callers but never merged into the payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    fields: BTreeMap<String, FieldValue>,
    errors: BTreeMap<String, FieldError>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` unless it already has a value. Returns whether it was set.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> bool {
        let field = field.into();
        if self.fields.contains_key(&field) {
            return false;
        }
        self.fields.insert(field, value.into());
        true
    }

    /// Rewrites the value of an existing field in place.
    ///
    /// Post-processing normalizes a value it already owns; it never installs
    /// a value from another source.
    pub(crate) fn update(&mut self, field: &str, f: impl FnOnce(FieldValue) -> FieldValue) {
        if let Some(value) = self.fields.remove(field) {
            self.fields.insert(field.to_string(), f(value));
        }
    }

    /// Drops a field and records why it could not be produced.
    pub(crate) fn fail(&mut self, field: &str, error: FieldError) {
        self.fields.remove(field);
        self.errors.insert(field.to_string(), error);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fields that were present but failed post-processing.
    pub fn errors(&self) -> &BTreeMap<String, FieldError> {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_refuses_overwrite() {
        let mut result = ExtractionResult::new();
        assert!(result.set("title", "First"));
        assert!(!result.set("title", "Second"));
        assert_eq!(result.get_str("title"), Some("First"));
    }

    #[test]
    fn serializes_flat_without_errors() {
        let mut result = ExtractionResult::new();
        result.set("title", "Hello");
        result.set("keywords", FieldValue::List(vec!["a".into(), "b".into()]));
        result.set("jsonld", FieldValue::Json(json!({"@type": "Thing"})));
        result.set("broken", "x");
        result.fail("broken", FieldError::MalformedJsonLd("eof".into()));

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonld": {"@type": "Thing"},
                "keywords": ["a", "b"],
                "title": "Hello"
            })
        );
        assert_eq!(result.errors().len(), 1);
        assert!(!result.contains("broken"));
    }

    #[test]
    fn update_only_touches_existing_fields() {
        let mut result = ExtractionResult::new();
        result.set("logo", "/a.png");
        result.update("logo", |_| FieldValue::from("https://x.test/a.png"));
        result.update("missing", |_| FieldValue::from("nope"));
        assert_eq!(result.get_str("logo"), Some("https://x.test/a.png"));
        assert!(!result.contains("missing"));
    }

    #[test]
    fn untagged_values_deserialize() {
        let text: FieldValue = serde_json::from_value(json!("x")).unwrap();
        let list: FieldValue = serde_json::from_value(json!(["x", "y"])).unwrap();
        let obj: FieldValue = serde_json::from_value(json!({"a": 1})).unwrap();
        assert_eq!(text, FieldValue::from("x"));
        assert_eq!(list, FieldValue::List(vec!["x".into(), "y".into()]));
        assert!(matches!(obj, FieldValue::Json(_)));
    }
}
