//! Action router — picks a follow-up action for an extraction and hands the
//! extraction to the matching downstream endpoint.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{info, warn};

use crate::dispatch::{ActionDispatcher, Endpoint};
use crate::error::{GatewayError, StageError};
use crate::gateway::{GatewayRequest, InferenceGateway};
use crate::pipeline::types::{RouteAction, RouteDecision};

const PROMPT_NAME: &str = "route_action";

pub struct ActionRouter {
    gateway: Arc<dyn InferenceGateway>,
    dispatcher: Arc<dyn ActionDispatcher>,
}

impl ActionRouter {
    pub fn new(gateway: Arc<dyn InferenceGateway>, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self {
            gateway,
            dispatcher,
        }
    }

    /// Decide and dispatch. Unrecognized decisions complete normally with a
    /// terminal action and no dispatch.
    pub async fn route(
        &self,
        agent_output: &Value,
        intent: &str,
        format: &str,
    ) -> Result<RouteDecision, StageError> {
        let request = GatewayRequest::new(
            PROMPT_NAME,
            build_route_system_prompt(),
            build_route_user_prompt(agent_output, intent, format),
            output_schema(),
        );
        // Only transport/model failures are fatal here; an unusable answer is a non-response.
        let raw = match self.gateway.invoke(request).await {
            Ok(raw) => raw,
            Err(GatewayError::InvalidOutput { reason, .. }) => {
                warn!(reason = %reason, "Router got no usable output from gateway");
                Value::Null
            }
            Err(e) => return Err(e.into()),
        };

        let (action, endpoint) = match interpret(&raw) {
            Interpreted::Action(action, endpoint) => (action, endpoint),
            Interpreted::Unrecognized => {
                warn!(output = %raw, "Router returned no recognized action");
                return Ok(RouteDecision {
                    action_taken: RouteAction::NoActionDetermined,
                    details: format!(
                        "AI did not determine a specific action from the defined list. AI output: {raw}"
                    ),
                });
            }
            Interpreted::NotAnObject => {
                warn!(output = %raw, "Router output is not an object");
                return Ok(RouteDecision {
                    action_taken: RouteAction::UnknownActionFromAi,
                    details: format!("AI returned an unstructured response: {raw}"),
                });
            }
        };

        let details = raw
            .get("details")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_details(action, intent));

        let confirmation = self.dispatcher.send(endpoint, agent_output).await?;
        info!(action = %action, endpoint = %endpoint, "Action routed");

        Ok(RouteDecision {
            action_taken: action,
            details: format!("{details}. {confirmation}"),
        })
    }
}

enum Interpreted {
    Action(RouteAction, Endpoint),
    /// Missing, non-text, or outside the known set.
    Unrecognized,
    /// A scalar or array where an object was expected.
    NotAnObject,
}

fn interpret(raw: &Value) -> Interpreted {
    match raw {
        Value::Object(map) => map
            .get("actionTaken")
            .and_then(Value::as_str)
            .and_then(|s| RouteAction::parse_dispatchable(s.trim()))
            .and_then(|action| Endpoint::for_action(action).map(|endpoint| (action, endpoint)))
            .map_or(Interpreted::Unrecognized, |(action, endpoint)| {
                Interpreted::Action(action, endpoint)
            }),
        Value::Null => Interpreted::Unrecognized,
        _ => Interpreted::NotAnObject,
    }
}

/// Details used when the gateway leaves them out.
fn default_details(action: RouteAction, intent: &str) -> String {
    match action {
        RouteAction::CreateTicket => format!("Ticket created for intent: {intent}"),
        RouteAction::EscalateIssue => format!("Escalation raised for intent: {intent}"),
        RouteAction::FlagComplianceRisk => format!("Compliance risk flagged for intent: {intent}"),
        RouteAction::LogAndClose => format!("Routine inquiry logged for intent: {intent}"),
        RouteAction::NoActionDetermined | RouteAction::UnknownActionFromAi => {
            format!("No action taken for intent: {intent}")
        }
    }
}

fn build_route_system_prompt() -> String {
    "You are an intelligent action router. Determine the most appropriate follow-up action \
     based on the document's format, its business intent, and the output from a specialized \
     processing agent.\n\n\
     Consider the following when deciding:\n\
     - Low urgency and a polite or neutral tone for a routine inquiry: 'log_and_close'.\n\
     - High urgency, an escalation, or a threatening/angry tone: 'escalate_issue'.\n\
     - Intent 'Complaint' not already escalated by tone or urgency: 'create_ticket'.\n\
     - Intent 'Fraud Risk' or 'Regulation' where the agent output flags something significant: \
     'flag_compliance_risk'.\n\
     - General RFQs or standard invoices that meet no other criteria: 'create_ticket'.\n\n\
     Possible actions:\n\
     - 'log_and_close': routine, low-priority items that only need recording.\n\
     - 'create_ticket': items to be tracked and worked on by a team member.\n\
     - 'escalate_issue': urgent items or negative sentiment needing immediate attention.\n\
     - 'flag_compliance_risk': regulatory concerns, potential fraud, or other compliance issues.\n\n\
     'details' should describe the action, e.g. \"Issue escalated due to repeated damaged \
     shipments.\""
        .to_string()
}

fn build_route_user_prompt(agent_output: &Value, intent: &str, format: &str) -> String {
    format!(
        "Document Format: {format}\nBusiness Intent: {intent}\nSpecialized Agent Output: {agent_output}"
    )
}

fn output_schema() -> Value {
    let actions: Vec<&str> = RouteAction::DISPATCHABLE.iter().map(|a| a.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "actionTaken": { "type": "string", "enum": actions },
            "details": { "type": "string", "description": "Details about the action taken." }
        },
        "required": ["actionTaken", "details"]
    })
}
