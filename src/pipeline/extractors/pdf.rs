//! PDF agent — invoice and policy extraction with deterministic flagging.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::GatewayError;
use crate::gateway::{Attachment, GatewayRequest, InferenceGateway, invoke_as};
use crate::pipeline::types::{InvoiceDetails, PdfExtraction, PolicyDetails};

const PROMPT_NAME: &str = "extract_pdf_data";

/// Gateway-facing shape. Any `flagged` the model sends is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPdfExtraction {
    extracted_text: Option<String>,
    is_invoice: Option<bool>,
    is_policy: Option<bool>,
    invoice_details: Option<InvoiceDetails>,
    policy_details: Option<PolicyDetails>,
}

pub struct PdfExtractor {
    gateway: Arc<dyn InferenceGateway>,
}

impl PdfExtractor {
    pub fn new(gateway: Arc<dyn InferenceGateway>) -> Self {
        Self { gateway }
    }

    /// Extract from a PDF given as a data URI. Plain text is accepted too and
    /// embedded in the prompt directly.
    pub async fn extract(&self, content: &str) -> Result<PdfExtraction, GatewayError> {
        let request = match Attachment::from_data_uri(content) {
            Some(attachment) => GatewayRequest::new(
                PROMPT_NAME,
                build_pdf_system_prompt(),
                "Here is the PDF document content (attached below).",
                output_schema(),
            )
            .with_attachment(attachment),
            None => GatewayRequest::new(
                PROMPT_NAME,
                build_pdf_system_prompt(),
                format!("Here is the PDF document content:\n{content}"),
                output_schema(),
            ),
        };

        let raw: RawPdfExtraction = invoke_as(self.gateway.as_ref(), request).await?;
        let extraction = coerce(raw);
        debug!(
            is_invoice = extraction.is_invoice,
            is_policy = extraction.is_policy,
            flagged = extraction.flagged,
            "PDF extraction complete"
        );
        Ok(extraction)
    }
}

fn coerce(raw: RawPdfExtraction) -> PdfExtraction {
    PdfExtraction {
        extracted_text: raw.extracted_text.unwrap_or_default(),
        is_invoice: raw.is_invoice.unwrap_or(false),
        is_policy: raw.is_policy.unwrap_or(false),
        invoice_details: raw.invoice_details,
        policy_details: raw.policy_details,
        flagged: false,
    }
    .with_flag_recomputed()
}

fn build_pdf_system_prompt() -> String {
    "You are an expert document analyst.\n\n\
     Analyze the provided PDF document and extract relevant information based on its type. \
     The PDF can be one of the following:\n\
     1. Invoice: extract the total amount and line items.\n\
     2. Policy document: check for mentions of GDPR and FDA.\n\n\
     Set isInvoice and isPolicy accordingly. If the document is neither, omit invoiceDetails \
     and policyDetails and set both flags to false. extractedText must always contain the \
     text of the document."
        .to_string()
}

fn output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "invoiceDetails": {
                "type": "object",
                "properties": {
                    "totalAmount": { "type": "number", "description": "The total amount of the invoice, if present." },
                    "lineItems": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "description": { "type": "string" },
                                "amount": { "type": "number" }
                            },
                            "required": ["description", "amount"]
                        }
                    }
                }
            },
            "policyDetails": {
                "type": "object",
                "properties": {
                    "mentionsGDPR": { "type": "boolean" },
                    "mentionsFDA": { "type": "boolean" }
                }
            },
            "extractedText": { "type": "string", "description": "The extracted text content from the PDF." },
            "isInvoice": { "type": "boolean" },
            "isPolicy": { "type": "boolean" }
        },
        "required": ["extractedText", "isInvoice", "isPolicy"]
    })
}
