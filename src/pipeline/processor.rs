//! Document processor — drives one run through classify → extract → route.
//!
//! Stages run strictly in order. Each stage writes two run log entries, a
//! "Processing..." placeholder and its outcome, in one append before the next
//! stage starts. A failing stage is recorded and ends the run; results from
//! earlier stages stay in the returned [`RunReport`].

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::dispatch::ActionDispatcher;
use crate::error::{PipelineError, StageError};
use crate::gateway::InferenceGateway;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::extractors::{EmailExtractor, JsonExtractor, PdfExtractor};
use crate::pipeline::router::ActionRouter;
use crate::pipeline::types::{
    ClassificationResult, Document, DocumentFormat, ExtractionResult, RouteDecision,
    RunReport, StageFailure,
};
use crate::runlog::{AgentName, LogEntry, RunLog};

/// A stage result as it appears in the run log.
trait Loggable: Serialize {
    fn log_action(&self) -> Option<String> {
        None
    }
}

impl Loggable for ClassificationResult {}

impl Loggable for ExtractionResult {}

impl Loggable for RouteDecision {
    fn log_action(&self) -> Option<String> {
        Some(format!("Action: {}", self.action_taken))
    }
}

pub struct DocumentProcessor {
    classifier: Classifier,
    email: EmailExtractor,
    json: JsonExtractor,
    pdf: PdfExtractor,
    router: ActionRouter,
    run_log: Arc<RunLog>,
    /// Held for the duration of a run.
    run_gate: Mutex<()>,
}

impl DocumentProcessor {
    pub fn new(
        gateway: Arc<dyn InferenceGateway>,
        dispatcher: Arc<dyn ActionDispatcher>,
        run_log: Arc<RunLog>,
    ) -> Self {
        Self {
            classifier: Classifier::new(gateway.clone()),
            email: EmailExtractor::new(gateway.clone()),
            json: JsonExtractor::new(gateway.clone()),
            pdf: PdfExtractor::new(gateway.clone()),
            router: ActionRouter::new(gateway, dispatcher),
            run_log,
            run_gate: Mutex::new(()),
        }
    }

    pub fn run_log(&self) -> &Arc<RunLog> {
        &self.run_log
    }

    /// Process one document.
    ///
    /// Returns `Err` only when the document is rejected up front or another
    /// run is in flight. Stage failures come back as a report with `failure` set.
    pub async fn process(&self, document: Document) -> Result<RunReport, PipelineError> {
        document.validate()?;
        let _gate = self
            .run_gate
            .try_lock()
            .map_err(|_| PipelineError::RunInProgress)?;

        let started = Instant::now();
        info!(format = %document.declared_format, "Run started");
        let mut report = RunReport::default();

        // Stage 1: classify
        let classifier_content = document.classifier_content();
        let classification = match self
            .run_stage(
                AgentName::Classifier,
                json!({
                    "documentContent": classifier_content,
                    "documentFormat": document.declared_format,
                }),
                async {
                    self.classifier
                        .classify(&classifier_content, document.declared_format)
                        .await
                        .map_err(StageError::from)
                },
            )
            .await
        {
            Ok(classification) => classification,
            Err(source) => return Ok(fail(report, AgentName::Classifier, source)),
        };
        report.classification = Some(classification);

        // Stage 2: extract with the agent for the classified format
        let agent = classification.format.agent();
        let content = document.content.as_str();
        let extraction = match classification.format {
            DocumentFormat::Email => {
                self.run_stage(agent, json!({ "emailContent": content }), async {
                    self.email
                        .extract(content)
                        .await
                        .map(ExtractionResult::Email)
                        .map_err(StageError::from)
                })
                .await
            }
            DocumentFormat::Json => {
                self.run_stage(agent, json!({ "webhookData": content }), async {
                    self.json
                        .extract(content)
                        .await
                        .map(ExtractionResult::Json)
                        .map_err(StageError::from)
                })
                .await
            }
            DocumentFormat::Pdf => {
                self.run_stage(
                    agent,
                    json!({ "pdfFileName": document.pdf_file_name() }),
                    async {
                        self.pdf
                            .extract(content)
                            .await
                            .map(ExtractionResult::Pdf)
                            .map_err(StageError::from)
                    },
                )
                .await
            }
        };
        let extraction = match extraction {
            Ok(extraction) => extraction,
            Err(source) => return Ok(fail(report, agent, source)),
        };

        // Stage 3: route
        let agent_output = serde_json::to_value(&extraction).unwrap_or_default();
        report.extraction = Some(extraction);
        let intent = classification.intent.as_str();
        let format = classification.format.as_str();
        let route = match self
            .run_stage(
                AgentName::ActionRouter,
                json!({
                    "agentOutput": agent_output,
                    "intent": intent,
                    "format": format,
                }),
                self.router.route(&agent_output, intent, format),
            )
            .await
        {
            Ok(route) => route,
            Err(source) => return Ok(fail(report, AgentName::ActionRouter, source)),
        };

        info!(
            intent,
            format,
            action = %route.action_taken,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run complete"
        );
        report.route = Some(route);
        Ok(report)
    }

    /// Run one stage and append its start and outcome entries.
    async fn run_stage<T, F>(&self, agent: AgentName, input: Value, stage: F) -> Result<T, StageError>
    where
        T: Loggable,
        F: Future<Output = Result<T, StageError>>,
    {
        let start_entry = LogEntry::started(agent, Some(input.clone()));
        debug!(agent = %agent, "Stage started");

        let outcome = stage.await;
        let end_entry = match &outcome {
            Ok(output) => {
                let entry = LogEntry::completed(
                    agent,
                    Some(input),
                    serde_json::to_value(output).unwrap_or_default(),
                );
                match output.log_action() {
                    Some(action) => entry.with_action(action),
                    None => entry,
                }
            }
            Err(e) => LogEntry::failed(agent, Some(input), &e.to_string()),
        };

        self.run_log.append(vec![start_entry, end_entry]).await;
        debug!(agent = %agent, ok = outcome.is_ok(), "Stage finished");
        outcome
    }
}

/// Close out a run that stopped at `agent`.
fn fail(mut report: RunReport, agent: AgentName, source: StageError) -> RunReport {
    let message = source.to_string();
    let err = PipelineError::Stage { agent, source };
    error!(agent = %agent, error = %err, "Run aborted");
    report.failure = Some(StageFailure {
        agent,
        error: message,
    });
    report
}
