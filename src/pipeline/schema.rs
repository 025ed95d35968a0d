//! Deterministic schema checks for JSON webhook payloads. No LLM involved.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Maximum number of sample values in a summary.
const SAMPLE_LIMIT: usize = 3;

/// Runtime type of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl PrimitiveType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Array,
            Value::Null => Self::Null,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered field → type contract. Anomalies are reported in declaration order.
pub type FieldSchema = [(&'static str, PrimitiveType)];

/// The contract every webhook payload must satisfy.
pub const WEBHOOK_SCHEMA: [(&str, PrimitiveType); 3] = [
    ("id", PrimitiveType::Number),
    ("amount", PrimitiveType::Number),
    ("timestamp", PrimitiveType::String),
];

/// Check `parsed` against `schema`, returning one message per violation.
pub fn validate(parsed: &Map<String, Value>, schema: &FieldSchema) -> Vec<String> {
    schema
        .iter()
        .filter_map(|(field, expected)| match parsed.get(*field) {
            None => Some(format!("Missing field: {field}")),
            Some(value) => {
                let actual = PrimitiveType::of(value);
                (actual != *expected).then(|| {
                    format!("Type mismatch for '{field}': expected {expected}, got {actual}")
                })
            }
        })
        .collect()
}

/// Key count plus the first few key/value pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSummary {
    pub total_keys: usize,
    pub sample_values: Map<String, Value>,
}

/// Summarize an object, keeping keys in the order they appeared in the input.
pub fn summarize(parsed: &Map<String, Value>) -> JsonSummary {
    JsonSummary {
        total_keys: parsed.len(),
        sample_values: parsed
            .iter()
            .take(SAMPLE_LIMIT)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

/// Render a schema as a JSON-ish contract for prompts.
pub fn describe(schema: &FieldSchema) -> String {
    let fields: Vec<String> = schema
        .iter()
        .map(|(field, ty)| format!("  \"{field}\": {ty}"))
        .collect();
    format!("{{\n{}\n}}", fields.join(",\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("Expected object, got {:?}", other),
        }
    }

    #[test]
    fn conforming_payload_has_no_anomalies() {
        let parsed = object(json!({"id": 1, "amount": 50.5, "timestamp": "2024-01-01T00:00:00Z"}));
        assert!(validate(&parsed, &WEBHOOK_SCHEMA).is_empty());
    }

    #[test]
    fn missing_id_reported_once() {
        let parsed = object(json!({"amount": 1, "timestamp": "t"}));
        assert_eq!(validate(&parsed, &WEBHOOK_SCHEMA), vec!["Missing field: id"]);
    }

    #[test]
    fn anomalies_follow_schema_order() {
        let parsed = object(json!({"timestamp": 5, "amount": "12"}));
        assert_eq!(
            validate(&parsed, &WEBHOOK_SCHEMA),
            vec![
                "Missing field: id".to_string(),
                "Type mismatch for 'amount': expected number, got string".to_string(),
                "Type mismatch for 'timestamp': expected string, got number".to_string(),
            ]
        );
    }

    #[test]
    fn null_and_array_are_mismatches() {
        let parsed = object(json!({"id": null, "amount": [1], "timestamp": "t"}));
        assert_eq!(
            validate(&parsed, &WEBHOOK_SCHEMA),
            vec![
                "Type mismatch for 'id': expected number, got null".to_string(),
                "Type mismatch for 'amount': expected number, got array".to_string(),
            ]
        );
    }

    #[test]
    fn extra_fields_are_ignored() {
        let parsed = object(json!({"id": 1, "amount": 2, "timestamp": "t", "note": "x"}));
        assert!(validate(&parsed, &WEBHOOK_SCHEMA).is_empty());
    }

    #[test]
    fn summary_keeps_first_three_in_input_order() {
        let parsed: Map<String, Value> =
            serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3, "last": 4}"#).unwrap();
        let summary = summarize(&parsed);
        assert_eq!(summary.total_keys, 4);
        let keys: Vec<&str> = summary.sample_values.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn summary_of_small_object_keeps_everything() {
        let summary = summarize(&object(json!({"a": true})));
        assert_eq!(summary.total_keys, 1);
        assert_eq!(summary.sample_values["a"], true);
    }

    #[test]
    fn describe_lists_fields() {
        let text = describe(&WEBHOOK_SCHEMA);
        assert!(text.contains("\"id\": number"));
        assert!(text.contains("\"timestamp\": string"));
    }
}
