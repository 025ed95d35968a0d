//! JSON agent — validates webhook payloads against the fixed contract.
//!
//! Well-formed input never reaches the model: the schema check and summary
//! are computed locally. Only unparseable text is sent to the gateway, which
//! is asked to describe what is wrong with it.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::GatewayError;
use crate::gateway::{GatewayRequest, InferenceGateway, invoke_as};
use crate::pipeline::schema::{self, PrimitiveType, WEBHOOK_SCHEMA};
use crate::pipeline::types::JsonExtraction;

const PROMPT_NAME: &str = "parse_json_webhook";

/// Leading anomaly for input that does not parse.
pub const INVALID_SYNTAX: &str = "Invalid JSON syntax";

#[derive(Debug, Default, Deserialize)]
struct RawJsonReport {
    #[serde(default)]
    anomalies: Option<Vec<String>>,
}

pub struct JsonExtractor {
    gateway: Arc<dyn InferenceGateway>,
}

impl JsonExtractor {
    pub fn new(gateway: Arc<dyn InferenceGateway>) -> Self {
        Self { gateway }
    }

    pub async fn extract(&self, raw: &str) -> Result<JsonExtraction, GatewayError> {
        match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => Ok(check_parsed(&parsed)),
            Err(e) => {
                info!(error = %e, "Webhook payload is not valid JSON, asking gateway for anomalies");
                self.fallback(raw).await
            }
        }
    }

    async fn fallback(&self, raw: &str) -> Result<JsonExtraction, GatewayError> {
        let request = GatewayRequest::new(
            PROMPT_NAME,
            build_fallback_system_prompt(),
            build_fallback_user_prompt(raw),
            output_schema(),
        );
        let report: RawJsonReport = invoke_as(self.gateway.as_ref(), request).await?;

        let mut anomalies = vec![INVALID_SYNTAX.to_string()];
        anomalies.extend(report.anomalies.unwrap_or_default());

        Ok(JsonExtraction {
            is_valid: false,
            anomalies,
            total_keys: None,
            sample_values: None,
        })
    }
}

/// Validate and summarize an already-parsed payload.
pub fn check_parsed(parsed: &Value) -> JsonExtraction {
    let Value::Object(object) = parsed else {
        // Nothing to look up fields in: every required field is missing.
        let mut anomalies = vec![format!(
            "Expected a JSON object, got {}",
            PrimitiveType::of(parsed)
        )];
        anomalies.extend(
            WEBHOOK_SCHEMA
                .iter()
                .map(|(field, _)| format!("Missing field: {field}")),
        );
        return JsonExtraction {
            is_valid: false,
            anomalies,
            total_keys: None,
            sample_values: None,
        };
    };

    let anomalies = schema::validate(object, &WEBHOOK_SCHEMA);
    let summary = schema::summarize(object);
    debug!(
        anomalies = anomalies.len(),
        total_keys = summary.total_keys,
        "Webhook payload checked"
    );

    JsonExtraction {
        is_valid: anomalies.is_empty(),
        anomalies,
        total_keys: Some(summary.total_keys),
        sample_values: Some(summary.sample_values),
    }
}

fn build_fallback_system_prompt() -> String {
    format!(
        "You're an expert JSON validator. The input below failed to parse. \
         Check whether it was meant to conform to this schema:\n{}\n\n\
         List every problem you find (syntax errors, missing fields, wrong types) \
         as short human-readable strings in \"anomalies\".",
        schema::describe(&WEBHOOK_SCHEMA)
    )
}

fn build_fallback_user_prompt(raw: &str) -> String {
    format!("Webhook JSON string:\n\n{raw}")
}

fn output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "isValid": { "type": "boolean" },
            "anomalies": { "type": "array", "items": { "type": "string" } },
            "totalKeys": { "type": "number" },
            "sampleValues": { "type": "object", "description": "Up to 3 fields." }
        },
        "required": ["isValid", "anomalies"]
    })
}
