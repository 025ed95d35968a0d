//! Inference gateway — turns a prompt plus an expected output shape into a
//! best-effort structured result.
//!
//! Every pipeline stage talks to the model through [`InferenceGateway`], so
//! untyped model output is confined to this boundary. Callers deserialize the
//! result into structs whose fields are all optional and apply their own
//! defaults.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::llm::costs;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};

static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:([A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+)(?:;[^;,]*)*;base64,(.+)$")
        .expect("data URI pattern is valid")
});

/// Binary content sent alongside a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub media_type: String,
    /// Base64 payload.
    pub data: String,
}

impl Attachment {
    /// Parse a `data:<media-type>[;params];base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let caps = DATA_URI.captures(uri.trim())?;
        Some(Self {
            media_type: caps[1].to_ascii_lowercase(),
            data: caps[2].trim().to_string(),
        })
    }
}

/// One gateway round-trip.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// Prompt identifier, used in logs and errors.
    pub name: &'static str,
    /// Instructions for the model.
    pub system: String,
    /// The rendered prompt with the document embedded.
    pub prompt: String,
    /// JSON Schema of the expected result.
    pub output_schema: Value,
    pub attachment: Option<Attachment>,
}

impl GatewayRequest {
    pub fn new(
        name: &'static str,
        system: impl Into<String>,
        prompt: impl Into<String>,
        output_schema: Value,
    ) -> Self {
        Self {
            name,
            system: system.into(),
            prompt: prompt.into(),
            output_schema,
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Capability interface for the natural-language inference service.
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Run the prompt and return the structured result.
    ///
    /// The result may not fully conform to `output_schema`.
    async fn invoke(&self, request: GatewayRequest) -> Result<Value, GatewayError>;
}

/// Invoke and deserialize into a boundary type.
///
/// A `null` result is treated as an empty object so all-optional boundary
/// structs come back with every field absent.
pub async fn invoke_as<T: DeserializeOwned>(
    gateway: &dyn InferenceGateway,
    request: GatewayRequest,
) -> Result<T, GatewayError> {
    let name = request.name;
    let value = gateway.invoke(request).await?;
    decode(name, value)
}

/// Deserialize a raw gateway result into a boundary type.
pub fn decode<T: DeserializeOwned>(prompt: &str, value: Value) -> Result<T, GatewayError> {
    let value = if value.is_null() {
        Value::Object(Map::new())
    } else {
        value
    };
    serde_json::from_value(value).map_err(|e| GatewayError::InvalidOutput {
        prompt: prompt.to_string(),
        reason: e.to_string(),
    })
}

// ── LLM-backed gateway ──────────────────────────────────────────────

/// Sampling settings for gateway calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatewayConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 1024,
        }
    }
}

/// Gateway implementation over an [`LlmProvider`].
pub struct LlmGateway {
    llm: Arc<dyn LlmProvider>,
    config: GatewayConfig,
}

impl LlmGateway {
    pub fn new(llm: Arc<dyn LlmProvider>, config: GatewayConfig) -> Self {
        Self { llm, config }
    }
}

#[async_trait]
impl InferenceGateway for LlmGateway {
    async fn invoke(&self, request: GatewayRequest) -> Result<Value, GatewayError> {
        let completion = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt(&request)),
            ChatMessage::user(build_user_prompt(&request)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        debug!(prompt = request.name, model = self.llm.model_name(), "Gateway call");
        let response = self.llm.complete(completion).await?;

        let cost = costs::estimate(
            self.llm.cost_per_token(),
            response.input_tokens,
            response.output_tokens,
        );
        info!(
            prompt = request.name,
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost_usd = %cost,
            "Gateway call complete"
        );

        let content = response.content.trim();
        if content.is_empty() {
            let reason = if response.finish_reason == FinishReason::Length {
                "response truncated (finish_reason=length) with no content"
            } else {
                "model returned empty content"
            };
            return Err(GatewayError::InvalidOutput {
                prompt: request.name.to_string(),
                reason: reason.to_string(),
            });
        }

        let json_str = extract_json_object(content);
        serde_json::from_str(&json_str).map_err(|e| {
            warn!(
                prompt = request.name,
                raw_response = %content,
                error = %e,
                "Gateway response is not JSON"
            );
            GatewayError::InvalidOutput {
                prompt: request.name.to_string(),
                reason: format!("JSON parse error: {e}"),
            }
        })
    }
}

fn build_system_prompt(request: &GatewayRequest) -> String {
    let schema = serde_json::to_string_pretty(&request.output_schema)
        .unwrap_or_else(|_| request.output_schema.to_string());
    format!(
        "{}\n\nRespond with ONLY a JSON object conforming to this JSON Schema:\n{}\n\
         Omit optional fields that do not apply. No other text.",
        request.system.trim_end(),
        schema
    )
}

fn build_user_prompt(request: &GatewayRequest) -> String {
    let mut prompt = request.prompt.clone();
    if let Some(ref attachment) = request.attachment {
        prompt.push_str(&format!(
            "\n\n[Attached document: {}, base64-encoded]\n{}",
            attachment.media_type, attachment.data
        ));
    }
    prompt
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
pub fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::CompletionResponse;
    use rust_decimal::Decimal;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    /// Mock LLM that returns a fixed response and remembers the last request.
    struct MockLlm {
        response: String,
        finish_reason: FinishReason,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl MockLlm {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.to_string(),
                finish_reason: FinishReason::Stop,
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-gateway"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.last_request.lock().unwrap() = Some(request);
            Ok(CompletionResponse {
                content: self.response.clone(),
                input_tokens: 10,
                output_tokens: 5,
                finish_reason: self.finish_reason,
                response_id: None,
            })
        }
    }

    fn request() -> GatewayRequest {
        GatewayRequest::new(
            "test_prompt",
            "You are a test.",
            "Classify this.",
            json!({"type": "object", "properties": {"label": {"type": "string"}}}),
        )
    }

    #[tokio::test]
    async fn llm_gateway_parses_fenced_json() {
        let llm = MockLlm::new("Sure:\n```json\n{\"label\": \"ok\"}\n```");
        let gateway = LlmGateway::new(llm.clone(), GatewayConfig::default());

        let value = gateway.invoke(request()).await.unwrap();
        assert_eq!(value["label"], "ok");

        let sent = llm.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.temperature, Some(0.1));
        assert_eq!(sent.max_tokens, Some(1024));
        assert!(sent.messages[0].content.contains("JSON Schema"));
        assert!(sent.messages[0].content.contains("\"label\""));
        assert_eq!(sent.messages[1].content, "Classify this.");
    }

    #[tokio::test]
    async fn llm_gateway_rejects_prose() {
        let gateway = LlmGateway::new(MockLlm::new("I cannot help with that."), GatewayConfig::default());
        let err = gateway.invoke(request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidOutput { .. }));
    }

    #[tokio::test]
    async fn llm_gateway_reports_truncation() {
        let llm = Arc::new(MockLlm {
            response: "   ".into(),
            finish_reason: FinishReason::Length,
            last_request: Mutex::new(None),
        });
        let gateway = LlmGateway::new(llm, GatewayConfig::default());
        let err = gateway.invoke(request()).await.unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[tokio::test]
    async fn llm_gateway_inlines_attachment() {
        let llm = MockLlm::new("{}");
        let gateway = LlmGateway::new(llm.clone(), GatewayConfig::default());
        let attachment = Attachment::from_data_uri("data:application/pdf;base64,JVBERi0x").unwrap();

        gateway
            .invoke(request().with_attachment(attachment))
            .await
            .unwrap();

        let sent = llm.last_request.lock().unwrap().clone().unwrap();
        assert!(sent.messages[1].content.contains("application/pdf"));
        assert!(sent.messages[1].content.ends_with("JVBERi0x"));
    }

    #[derive(Debug, Default, Deserialize)]
    struct Boundary {
        label: Option<String>,
    }

    #[test]
    fn decode_treats_null_as_empty() {
        let decoded: Boundary = decode("p", Value::Null).unwrap();
        assert!(decoded.label.is_none());
    }

    #[test]
    fn decode_rejects_wrong_shape() {
        let err = decode::<Boundary>("p", json!({"label": 7})).unwrap_err();
        match err {
            GatewayError::InvalidOutput { prompt, .. } => assert_eq!(prompt, "p"),
            other => panic!("Expected InvalidOutput, got {:?}", other),
        }
    }

    #[test]
    fn data_uri_parsing() {
        let a = Attachment::from_data_uri("data:application/pdf;base64,QUJD").unwrap();
        assert_eq!(a.media_type, "application/pdf");
        assert_eq!(a.data, "QUJD");

        let named =
            Attachment::from_data_uri("data:application/pdf;name=q3.pdf;base64,QUJD").unwrap();
        assert_eq!(named.data, "QUJD");

        assert!(Attachment::from_data_uri("Invoice #42 total $12,000").is_none());
        assert!(Attachment::from_data_uri("data:text/plain,hello").is_none());
    }

    #[test]
    fn extract_json_direct_object() {
        let input = r#"{"action": "notify"}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn extract_json_from_markdown_block() {
        let input = "```json\n{\"format\": \"Email\"}\n```";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.contains("Email"));
    }

    #[test]
    fn extract_json_embedded_in_text() {
        let input = "My analysis: {\"intent\": \"RFQ\"} done.";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.ends_with('}'));
    }
}
