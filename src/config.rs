//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::gateway::GatewayConfig;
use crate::llm::{LlmBackend, LlmConfig};

/// Service configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub gateway: GatewayConfig,
    /// HTTP listen port.
    pub port: u16,
    /// Base URL for real action delivery. `None` uses the simulated dispatcher.
    pub dispatch_url: Option<String>,
    /// Directory for rolling log files. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend: LlmBackend = parse_or(&get, "CHAINED_ACTIONS_LLM_BACKEND", LlmBackend::Anthropic)?;
        let api_key_var = backend.api_key_var();
        let api_key = get(api_key_var)
            .ok_or_else(|| ConfigError::MissingEnvVar(api_key_var.to_string()))?;
        let model = get("CHAINED_ACTIONS_MODEL")
            .unwrap_or_else(|| backend.default_model().to_string());

        let defaults = GatewayConfig::default();
        let temperature: f32 = parse_or(&get, "CHAINED_ACTIONS_TEMPERATURE", defaults.temperature)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "CHAINED_ACTIONS_TEMPERATURE".to_string(),
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }
        let max_tokens: u32 = parse_or(&get, "CHAINED_ACTIONS_MAX_TOKENS", defaults.max_tokens)?;

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
            },
            gateway: GatewayConfig {
                temperature,
                max_tokens,
            },
            port: parse_or(&get, "CHAINED_ACTIONS_PORT", 8080)?,
            dispatch_url: get("CHAINED_ACTIONS_DISPATCH_URL"),
            log_dir: get("CHAINED_ACTIONS_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
