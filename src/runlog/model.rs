//! Run log data model — stage records and broadcast event types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder output recorded when a stage starts.
pub const PROCESSING_PLACEHOLDER: &str = "Processing...";

/// The pipeline agent that produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentName {
    Classifier,
    #[serde(rename = "Email Agent")]
    EmailAgent,
    #[serde(rename = "JSON Agent")]
    JsonAgent,
    #[serde(rename = "PDF Agent")]
    PdfAgent,
    #[serde(rename = "Action Router")]
    ActionRouter,
}

impl AgentName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classifier => "Classifier",
            Self::EmailAgent => "Email Agent",
            Self::JsonAgent => "JSON Agent",
            Self::PdfAgent => "PDF Agent",
            Self::ActionRouter => "Action Router",
        }
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage record. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub agent: AgentName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Real output, the processing placeholder, or `{"error": "..."}`.
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl LogEntry {
    /// Record written when a stage begins.
    pub fn started(agent: AgentName, input: Option<Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            agent,
            input,
            output: Value::String(PROCESSING_PLACEHOLDER.to_string()),
            action: None,
        }
    }

    /// Record written when a stage completes successfully.
    pub fn completed(agent: AgentName, input: Option<Value>, output: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            agent,
            input,
            output,
            action: None,
        }
    }

    /// Record written when a stage fails.
    pub fn failed(agent: AgentName, input: Option<Value>, error: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            agent,
            input,
            output: serde_json::json!({ "error": error }),
            action: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.output.as_str() == Some(PROCESSING_PLACEHOLDER)
    }

    /// The error message, if this entry records a failure.
    pub fn error(&self) -> Option<&str> {
        self.output.get("error").and_then(Value::as_str)
    }
}

/// Messages pushed to run log observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// Full snapshot, sent on connect and after a lagged receiver.
    LogSync { entries: Vec<LogEntry> },
    /// A stage's entries were appended.
    Appended { entries: Vec<LogEntry> },
    /// The log was emptied.
    Cleared { removed: usize },
}

/// Commands accepted from log observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LogCommand {
    Clear,
}
