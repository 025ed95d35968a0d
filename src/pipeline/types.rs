//! Shared types for the document processing pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::runlog::model::AgentName;

/// Invoices above this total are flagged.
pub const HIGH_VALUE_INVOICE_THRESHOLD: f64 = 10_000.0;

// ── Document ────────────────────────────────────────────────────────

/// Document format, as declared by the submitter or asserted by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    Email,
    #[serde(rename = "JSON", alias = "Json")]
    Json,
    #[serde(rename = "PDF", alias = "Pdf")]
    Pdf,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 3] = [Self::Email, Self::Json, Self::Pdf];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Json => "JSON",
            Self::Pdf => "PDF",
        }
    }

    /// The extractor agent responsible for this format.
    pub fn agent(&self) -> AgentName {
        match self {
            Self::Email => AgentName::EmailAgent,
            Self::Json => AgentName::JsonAgent,
            Self::Pdf => AgentName::PdfAgent,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "json" => Ok(Self::Json),
            "pdf" => Ok(Self::Pdf),
            other => Err(format!("unknown document format '{other}'")),
        }
    }
}

/// One submitted document. Immutable once submitted.
///
/// For PDFs, `content` is a data URI (`data:application/pdf;base64,...`)
/// produced by the upload layer, and `file_name` is the uploaded file's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub content: String,
    #[serde(rename = "format", alias = "declaredFormat")]
    pub declared_format: DocumentFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Document {
    pub fn new(content: impl Into<String>, declared_format: DocumentFormat) -> Self {
        Self {
            content: content.into(),
            declared_format,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Reject documents with nothing to process.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.content.trim().is_empty() {
            return Err(PipelineError::EmptyDocument {
                format: self.declared_format.to_string(),
            });
        }
        Ok(())
    }

    /// What the classifier sees. PDFs are described by name, not payload.
    pub fn classifier_content(&self) -> String {
        match self.declared_format {
            DocumentFormat::Pdf => format!("PDF File: {}", self.pdf_file_name()),
            _ => self.content.clone(),
        }
    }

    pub fn pdf_file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("document.pdf")
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Business intent of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    #[serde(rename = "RFQ")]
    Rfq,
    Complaint,
    Invoice,
    Regulation,
    #[serde(rename = "Fraud Risk", alias = "FraudRisk")]
    FraudRisk,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Self::Rfq,
        Self::Complaint,
        Self::Invoice,
        Self::Regulation,
        Self::FraudRisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rfq => "RFQ",
            Self::Complaint => "Complaint",
            Self::Invoice => "Invoice",
            Self::Regulation => "Regulation",
            Self::FraudRisk => "Fraud Risk",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "rfq" => Ok(Self::Rfq),
            "complaint" => Ok(Self::Complaint),
            "invoice" => Ok(Self::Invoice),
            "regulation" => Ok(Self::Regulation),
            "fraudrisk" => Ok(Self::FraudRisk),
            _ => Err(format!("unknown intent '{}'", s.trim())),
        }
    }
}

/// Classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub format: DocumentFormat,
    pub intent: Intent,
}

// ── Extraction ──────────────────────────────────────────────────────

/// Email extractor output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailExtraction {
    pub sender: String,
    pub urgency: String,
    pub issue_request: String,
    pub tone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_triggered: Option<String>,
}

/// JSON extractor output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExtraction {
    pub is_valid: bool,
    pub anomalies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_keys: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_values: Option<Map<String, Value>>,
}

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItem>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDetails {
    #[serde(
        rename = "mentionsGDPR",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mentions_gdpr: Option<bool>,
    #[serde(
        rename = "mentionsFDA",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mentions_fda: Option<bool>,
}

/// PDF extractor output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfExtraction {
    pub extracted_text: String,
    pub is_invoice: bool,
    pub is_policy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_details: Option<InvoiceDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_details: Option<PolicyDetails>,
    pub flagged: bool,
}

impl PdfExtraction {
    /// Whether this document must be flagged: a high-value invoice, or a
    /// policy that mentions GDPR or FDA.
    pub fn should_flag(&self) -> bool {
        let high_value_invoice = self.is_invoice
            && self
                .invoice_details
                .as_ref()
                .and_then(|d| d.total_amount)
                .is_some_and(|total| total > HIGH_VALUE_INVOICE_THRESHOLD);

        let regulated_policy = self.is_policy
            && self.policy_details.as_ref().is_some_and(|p| {
                p.mentions_gdpr.unwrap_or(false) || p.mentions_fda.unwrap_or(false)
            });

        high_value_invoice || regulated_policy
    }

    /// Overwrite `flagged` with the deterministic rule.
    pub fn with_flag_recomputed(mut self) -> Self {
        self.flagged = self.should_flag();
        self
    }
}

/// Format-specific extractor output.
///
/// Serialized untagged so downstream consumers see the flat per-format shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractionResult {
    Email(EmailExtraction),
    Json(JsonExtraction),
    Pdf(PdfExtraction),
}

// ── Routing ─────────────────────────────────────────────────────────

/// Follow-up action chosen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
    LogAndClose,
    CreateTicket,
    EscalateIssue,
    FlagComplianceRisk,
    /// The gateway picked nothing from the known set.
    NoActionDetermined,
    /// The gateway's action field was present but not interpretable as text.
    UnknownActionFromAi,
}

impl RouteAction {
    /// Actions the gateway may choose; each maps to a downstream endpoint.
    pub const DISPATCHABLE: [RouteAction; 4] = [
        Self::LogAndClose,
        Self::CreateTicket,
        Self::EscalateIssue,
        Self::FlagComplianceRisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LogAndClose => "log_and_close",
            Self::CreateTicket => "create_ticket",
            Self::EscalateIssue => "escalate_issue",
            Self::FlagComplianceRisk => "flag_compliance_risk",
            Self::NoActionDetermined => "no_action_determined",
            Self::UnknownActionFromAi => "unknown_action_from_ai",
        }
    }

    /// Parse one of the dispatchable actions. Exact match only.
    pub fn parse_dispatchable(s: &str) -> Option<Self> {
        Self::DISPATCHABLE.into_iter().find(|a| a.as_str() == s)
    }
}

impl fmt::Display for RouteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Router output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDecision {
    pub action_taken: RouteAction,
    pub details: String,
}

// ── Run report ──────────────────────────────────────────────────────

/// The stage that aborted a run, with its error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub agent: AgentName,
    pub error: String,
}

/// Outcome of one run. Stages that completed before a failure keep their results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub classification: Option<ClassificationResult>,
    pub extraction: Option<ExtractionResult>,
    pub route: Option<RouteDecision>,
    pub failure: Option<StageFailure>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.route.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(total: Option<f64>) -> PdfExtraction {
        PdfExtraction {
            extracted_text: "INVOICE".into(),
            is_invoice: true,
            is_policy: false,
            invoice_details: Some(InvoiceDetails {
                total_amount: total,
                line_items: None,
            }),
            policy_details: None,
            flagged: false,
        }
    }

    fn policy(gdpr: Option<bool>, fda: Option<bool>) -> PdfExtraction {
        PdfExtraction {
            extracted_text: "POLICY".into(),
            is_invoice: false,
            is_policy: true,
            invoice_details: None,
            policy_details: Some(PolicyDetails {
                mentions_gdpr: gdpr,
                mentions_fda: fda,
            }),
            flagged: true,
        }
    }

    #[test]
    fn invoice_threshold_is_strict() {
        assert!(invoice(Some(10_001.0)).should_flag());
        assert!(!invoice(Some(10_000.0)).should_flag());
        assert!(!invoice(None).should_flag());
    }

    #[test]
    fn amount_ignored_when_not_an_invoice() {
        let mut doc = invoice(Some(50_000.0));
        doc.is_invoice = false;
        assert!(!doc.should_flag());
    }

    #[test]
    fn policy_flags_on_gdpr_or_fda() {
        assert!(policy(Some(true), Some(false)).should_flag());
        assert!(policy(None, Some(true)).should_flag());
        assert!(!policy(Some(false), Some(false)).should_flag());
        assert!(!policy(None, None).should_flag());
    }

    #[test]
    fn recompute_overrides_incoming_flag() {
        let doc = policy(Some(false), Some(false)).with_flag_recomputed();
        assert!(!doc.flagged);
        let doc = invoice(Some(20_000.0)).with_flag_recomputed();
        assert!(doc.flagged);
    }

    #[test]
    fn intent_wire_names() {
        assert_eq!(serde_json::to_value(Intent::FraudRisk).unwrap(), "Fraud Risk");
        let parsed: Intent = serde_json::from_value("FraudRisk".into()).unwrap();
        assert_eq!(parsed, Intent::FraudRisk);
        assert_eq!("fraud risk".parse::<Intent>(), Ok(Intent::FraudRisk));
        assert_eq!("rfq".parse::<Intent>(), Ok(Intent::Rfq));
        assert!("spam".parse::<Intent>().is_err());
    }

    #[test]
    fn format_wire_names() {
        assert_eq!(serde_json::to_value(DocumentFormat::Json).unwrap(), "JSON");
        assert_eq!("pdf".parse::<DocumentFormat>(), Ok(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::Email.agent(), AgentName::EmailAgent);
    }

    #[test]
    fn empty_document_rejected() {
        let err = Document::new("   \n", DocumentFormat::Email)
            .validate()
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDocument { .. }));
        assert!(Document::new("hi", DocumentFormat::Email).validate().is_ok());
    }

    #[test]
    fn pdf_classifier_content_uses_file_name() {
        let doc = Document::new("data:application/pdf;base64,AAAA", DocumentFormat::Pdf)
            .with_file_name("q3-invoice.pdf");
        assert_eq!(doc.classifier_content(), "PDF File: q3-invoice.pdf");

        let email = Document::new("Hello", DocumentFormat::Email);
        assert_eq!(email.classifier_content(), "Hello");
    }

    #[test]
    fn extraction_serializes_flat() {
        let result = ExtractionResult::Json(JsonExtraction {
            is_valid: true,
            anomalies: vec![],
            total_keys: Some(3),
            sample_values: None,
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], true);
        assert_eq!(json["totalKeys"], 3);
        assert!(json.get("sampleValues").is_none());
    }

    #[test]
    fn route_action_parsing_is_exact() {
        assert_eq!(
            RouteAction::parse_dispatchable("create_ticket"),
            Some(RouteAction::CreateTicket)
        );
        assert_eq!(RouteAction::parse_dispatchable("no_action_determined"), None);
        assert_eq!(RouteAction::parse_dispatchable("Create_Ticket"), None);
        assert_eq!(
            serde_json::to_value(RouteAction::UnknownActionFromAi).unwrap(),
            "unknown_action_from_ai"
        );
    }
}
