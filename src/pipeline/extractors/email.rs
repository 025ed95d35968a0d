//! Email agent — pulls sender, urgency, request and tone out of an email.

use std::sync::Arc;

use mail_parser::MessageParser;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::GatewayError;
use crate::gateway::{GatewayRequest, InferenceGateway, invoke_as};
use crate::pipeline::types::EmailExtraction;

const PROMPT_NAME: &str = "extract_email_data";

const UNKNOWN: &str = "unknown";

/// Gateway-facing shape. Every field may be missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEmailExtraction {
    sender: Option<String>,
    urgency: Option<String>,
    issue_request: Option<String>,
    tone: Option<String>,
    action_triggered: Option<String>,
}

/// Headers recovered locally, used as prompt hints and fallbacks.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HeaderHints {
    pub from: Option<String>,
    pub subject: Option<String>,
}

/// Parse RFC 5322 headers if the content has any.
pub fn parse_headers(content: &str) -> HeaderHints {
    let Some(parsed) = MessageParser::default().parse(content.as_bytes()) else {
        return HeaderHints::default();
    };

    HeaderHints {
        from: parsed
            .from()
            .and_then(|addr| addr.first())
            .and_then(|a| a.address())
            .map(|s| s.to_string()),
        subject: parsed.subject().map(|s| s.to_string()),
    }
}

pub struct EmailExtractor {
    gateway: Arc<dyn InferenceGateway>,
}

impl EmailExtractor {
    pub fn new(gateway: Arc<dyn InferenceGateway>) -> Self {
        Self { gateway }
    }

    pub async fn extract(&self, content: &str) -> Result<EmailExtraction, GatewayError> {
        let hints = parse_headers(content);
        let request = GatewayRequest::new(
            PROMPT_NAME,
            build_email_system_prompt(),
            build_email_user_prompt(content, &hints),
            output_schema(),
        );
        let raw: RawEmailExtraction = invoke_as(self.gateway.as_ref(), request).await?;
        Ok(coerce(raw, &hints))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn coerce(raw: RawEmailExtraction, hints: &HeaderHints) -> EmailExtraction {
    EmailExtraction {
        sender: non_empty(raw.sender)
            .or_else(|| hints.from.clone())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        urgency: non_empty(raw.urgency).unwrap_or_else(|| UNKNOWN.to_string()),
        issue_request: non_empty(raw.issue_request)
            .unwrap_or_else(|| "No issue or request identified".to_string()),
        tone: non_empty(raw.tone).unwrap_or_else(|| UNKNOWN.to_string()),
        action_triggered: non_empty(raw.action_triggered),
    }
}

fn build_email_system_prompt() -> String {
    "You are an AI assistant specializing in processing emails. Extract key information \
     from the email and determine whether an action should be triggered.\n\n\
     Fields:\n\
     - sender: the email address of the sender\n\
     - urgency: the urgency level (e.g. high, medium, low)\n\
     - issueRequest: a brief description of the issue or request\n\
     - tone: the tone of the email (e.g. escalation, polite, threatening)\n\
     - actionTriggered: optional; the action to trigger, e.g. \"escalate to CRM\" when the \
     tone is angry and urgency is high"
        .to_string()
}

fn build_email_user_prompt(content: &str, hints: &HeaderHints) -> String {
    let mut prompt = String::with_capacity(content.len() + 128);
    if let Some(ref from) = hints.from {
        prompt.push_str(&format!("From header: {from}\n"));
    }
    if let Some(ref subject) = hints.subject {
        prompt.push_str(&format!("Subject header: {subject}\n"));
    }
    if !prompt.is_empty() {
        prompt.push('\n');
    }
    prompt.push_str("Analyze the following email content:\n");
    prompt.push_str(content);
    prompt
}

fn output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sender": { "type": "string", "description": "The sender of the email." },
            "urgency": { "type": "string", "description": "The urgency level of the email (e.g., high, medium, low)." },
            "issueRequest": { "type": "string", "description": "A brief description of the issue or request in the email." },
            "tone": { "type": "string", "description": "The tone of the email (e.g., escalation, polite, threatening)." },
            "actionTriggered": { "type": "string", "description": "The action triggered based on the email data (e.g., escalate to CRM)." }
        },
        "required": ["sender", "urgency", "issueRequest", "tone"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedGateway(Value);

    #[async_trait]
    impl InferenceGateway for FixedGateway {
        async fn invoke(&self, _request: GatewayRequest) -> Result<Value, GatewayError> {
            Ok(self.0.clone())
        }
    }

    const RAW_EMAIL: &str = "From: Dana Ortiz <dana@acme.example>\r\n\
                             Subject: Broken shipment\r\n\
                             \r\n\
                             This is the third time the order arrived damaged. Fix it today.\r\n";

    #[test]
    fn headers_parsed_from_raw_email() {
        let hints = parse_headers(RAW_EMAIL);
        assert_eq!(hints.from.as_deref(), Some("dana@acme.example"));
        assert_eq!(hints.subject.as_deref(), Some("Broken shipment"));
    }

    #[test]
    fn user_prompt_includes_hints_and_body() {
        let hints = parse_headers(RAW_EMAIL);
        let prompt = build_email_user_prompt(RAW_EMAIL, &hints);
        assert!(prompt.starts_with("From header: dana@acme.example"));
        assert!(prompt.contains("Subject header: Broken shipment"));
        assert!(prompt.contains("arrived damaged"));
    }

    #[tokio::test]
    async fn extraction_uses_gateway_fields() {
        let extractor = EmailExtractor::new(Arc::new(FixedGateway(json!({
            "sender": "dana@acme.example",
            "urgency": "high",
            "issueRequest": "Damaged shipment, third occurrence",
            "tone": "escalation",
            "actionTriggered": "escalate to CRM"
        }))));
        let result = extractor.extract(RAW_EMAIL).await.unwrap();
        assert_eq!(result.urgency, "high");
        assert_eq!(result.tone, "escalation");
        assert_eq!(result.action_triggered.as_deref(), Some("escalate to CRM"));
    }

    #[tokio::test]
    async fn missing_sender_falls_back_to_from_header() {
        let extractor = EmailExtractor::new(Arc::new(FixedGateway(json!({
            "urgency": "low",
            "tone": "polite"
        }))));
        let result = extractor.extract(RAW_EMAIL).await.unwrap();
        assert_eq!(result.sender, "dana@acme.example");
        assert_eq!(result.issue_request, "No issue or request identified");
        assert!(result.action_triggered.is_none());
    }

    #[tokio::test]
    async fn empty_gateway_result_gets_defaults() {
        let extractor = EmailExtractor::new(Arc::new(FixedGateway(Value::Null)));
        let result = extractor.extract("hi, any update?").await.unwrap();
        assert_eq!(result.sender, "unknown");
        assert_eq!(result.urgency, "unknown");
        assert_eq!(result.tone, "unknown");
    }
}
