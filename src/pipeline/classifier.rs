//! Classifier — determines document format and business intent.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::gateway::{GatewayRequest, InferenceGateway, invoke_as};
use crate::pipeline::types::{ClassificationResult, DocumentFormat, Intent};

const PROMPT_NAME: &str = "classify_document";

/// Gateway-facing shape. Every field may be missing.
#[derive(Debug, Default, Deserialize)]
struct RawClassification {
    format: Option<String>,
    intent: Option<String>,
}

pub struct Classifier {
    gateway: Arc<dyn InferenceGateway>,
}

impl Classifier {
    pub fn new(gateway: Arc<dyn InferenceGateway>) -> Self {
        Self { gateway }
    }

    /// Classify a document. The returned format is the model's assertion and
    /// is authoritative even when it differs from `declared`.
    pub async fn classify(
        &self,
        content: &str,
        declared: DocumentFormat,
    ) -> Result<ClassificationResult, GatewayError> {
        let request = GatewayRequest::new(
            PROMPT_NAME,
            build_classify_system_prompt(),
            build_classify_user_prompt(content, declared),
            output_schema(),
        );
        let raw: RawClassification = invoke_as(self.gateway.as_ref(), request).await?;
        let result = coerce(raw, declared)?;

        if result.format != declared {
            debug!(
                declared = %declared,
                classified = %result.format,
                "Classifier re-asserted a different format"
            );
        }
        Ok(result)
    }
}

/// Apply defaults: a missing format falls back to the declared one; intent is required.
fn coerce(
    raw: RawClassification,
    declared: DocumentFormat,
) -> Result<ClassificationResult, GatewayError> {
    let format = match raw.format.as_deref().map(str::parse::<DocumentFormat>) {
        Some(Ok(format)) => format,
        Some(Err(e)) => {
            warn!(error = %e, "Unrecognized format from classifier, using declared format");
            declared
        }
        None => declared,
    };

    let intent = raw
        .intent
        .as_deref()
        .ok_or_else(|| "no intent returned".to_string())
        .and_then(str::parse::<Intent>)
        .map_err(|reason| GatewayError::InvalidOutput {
            prompt: PROMPT_NAME.to_string(),
            reason,
        })?;

    Ok(ClassificationResult { format, intent })
}

fn build_classify_system_prompt() -> String {
    let formats: Vec<&str> = DocumentFormat::ALL.iter().map(|f| f.as_str()).collect();
    let intents: Vec<&str> = Intent::ALL.iter().map(|i| i.as_str()).collect();
    format!(
        "You are an expert document classifier. You will determine the format and business \
         intent of the document.\n\n\
         The document format will be one of the following: {}.\n\
         The business intent will be one of the following: {}.\n\n\
         Examples:\n\
         - \"Dear Sir/Madam, I am writing to complain about...\" → format Email, intent Complaint\n\
         - {{\"quoteRequest\": ...}} → format JSON, intent RFQ\n\
         - [PDF content] → format PDF, intent Invoice",
        formats.join(", "),
        intents.join(", ")
    )
}

fn build_classify_user_prompt(content: &str, declared: DocumentFormat) -> String {
    format!(
        "Now classify the following document.\n\nFormat: {}\nContent:\n{}",
        declared, content
    )
}

fn output_schema() -> Value {
    let formats: Vec<&str> = DocumentFormat::ALL.iter().map(|f| f.as_str()).collect();
    let intents: Vec<&str> = Intent::ALL.iter().map(|i| i.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "format": { "type": "string", "enum": formats, "description": "The format of the document." },
            "intent": { "type": "string", "enum": intents, "description": "The business intent of the document." }
        },
        "required": ["format", "intent"]
    })
}
