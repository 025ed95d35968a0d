//! Downstream action dispatch — delivers the router's decision to the
//! CRM / risk-alert endpoints.
//!
//! Two implementations:
//! - [`SimulatedDispatcher`]: never fails, only reports what it would send.
//! - [`HttpDispatcher`]: POSTs the payload to a configured base URL.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::pipeline::types::RouteAction;

/// The fixed set of downstream endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Endpoint {
    CreateTicket,
    Escalate,
    RiskAlert,
    LogInquiry,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::CreateTicket => "/crm/create_ticket",
            Self::Escalate => "/crm/escalate",
            Self::RiskAlert => "/risk_alert/flag",
            Self::LogInquiry => "/crm/log_inquiry",
        }
    }

    /// Endpoint serving a routed action. `None` for terminal non-actions.
    pub fn for_action(action: RouteAction) -> Option<Self> {
        match action {
            RouteAction::CreateTicket => Some(Self::CreateTicket),
            RouteAction::EscalateIssue => Some(Self::Escalate),
            RouteAction::FlagComplianceRisk => Some(Self::RiskAlert),
            RouteAction::LogAndClose => Some(Self::LogInquiry),
            RouteAction::NoActionDetermined | RouteAction::UnknownActionFromAi => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Capability interface for downstream delivery.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Deliver `payload` to `endpoint`. Returns a confirmation message.
    async fn send(&self, endpoint: Endpoint, payload: &Value) -> Result<String, DispatchError>;
}

// ── Simulated ───────────────────────────────────────────────────────

/// A call the simulated dispatcher received.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord {
    pub endpoint: Endpoint,
    pub payload: Value,
}

/// Dispatcher that performs no delivery and echoes the payload back.
#[derive(Default)]
pub struct SimulatedDispatcher {
    sent: Mutex<Vec<DispatchRecord>>,
}

impl SimulatedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received so far, oldest first.
    pub async fn sent(&self) -> Vec<DispatchRecord> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ActionDispatcher for SimulatedDispatcher {
    async fn send(&self, endpoint: Endpoint, payload: &Value) -> Result<String, DispatchError> {
        info!(endpoint = %endpoint, "Simulating downstream call");
        self.sent.lock().await.push(DispatchRecord {
            endpoint,
            payload: payload.clone(),
        });
        Ok(format!(
            "Simulated {} call. Data payload: {}",
            endpoint.path(),
            payload
        ))
    }
}

// ── HTTP ────────────────────────────────────────────────────────────

/// Dispatcher that POSTs the payload as JSON to `{base_url}{path}`.
pub struct HttpDispatcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDispatcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl ActionDispatcher for HttpDispatcher {
    async fn send(&self, endpoint: Endpoint, payload: &Value) -> Result<String, DispatchError> {
        let request_id = Uuid::new_v4();
        let url = self.url_for(endpoint);
        debug!(url = %url, request_id = %request_id, "Dispatching action");

        let response = self
            .client
            .post(&url)
            .header("X-Request-Id", request_id.to_string())
            .json(payload)
            .send()
            .await
            .map_err(|e| DispatchError::SendFailed {
                endpoint: endpoint.path().to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Rejected {
                endpoint: endpoint.path().to_string(),
                status: status.as_u16(),
            });
        }

        info!(endpoint = %endpoint, request_id = %request_id, status = status.as_u16(), "Action delivered");
        Ok(format!(
            "Delivered {} call (request {}, status {})",
            endpoint.path(),
            request_id,
            status.as_u16()
        ))
    }
}
