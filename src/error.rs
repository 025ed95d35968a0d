//! Error types for Chained Actions.

use crate::runlog::model::AgentName;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Inference gateway errors.
///
/// `Llm` covers transport and model failures. `InvalidOutput` means the model
/// answered but nothing usable could be coerced out of the answer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Prompt {prompt} returned unusable output: {reason}")]
    InvalidOutput { prompt: String, reason: String },
}

/// Downstream action dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatch to {endpoint} failed: {reason}")]
    SendFailed { endpoint: String, reason: String },

    #[error("Dispatch to {endpoint} rejected with status {status}")]
    Rejected { endpoint: String, status: u16 },
}

/// Failure of a single pipeline stage. Always fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Missing input: please provide content for {format}")]
    EmptyDocument { format: String },

    #[error("A run is already in progress")]
    RunInProgress,

    #[error("{agent} failed: {source}")]
    Stage {
        agent: AgentName,
        #[source]
        source: StageError,
    },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
