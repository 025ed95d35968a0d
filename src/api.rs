//! HTTP + WebSocket surface for submitting documents and watching the run log.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::pipeline::DocumentProcessor;
use crate::pipeline::types::{Document, DocumentFormat};
use crate::runlog::{AgentName, LogCommand, LogEvent, RunLog};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<DocumentProcessor>,
    pub run_log: Arc<RunLog>,
}

/// Build the Axum router with the processing, log and WebSocket routes.
pub fn routes(processor: Arc<DocumentProcessor>) -> Router {
    let state = AppState {
        run_log: processor.run_log().clone(),
        processor,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/process", post(process_document))
        .route("/api/log", get(list_log).delete(clear_log))
        .route("/api/log/router", get(list_router_log))
        .route("/ws/log", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chained-actions"
    }))
}

// ── Processing ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    content: String,
    format: DocumentFormat,
    #[serde(default)]
    file_name: Option<String>,
}

async fn process_document(
    State(state): State<AppState>,
    Json(body): Json<ProcessRequest>,
) -> Response {
    let mut document = Document::new(body.content, body.format);
    if let Some(name) = body.file_name {
        document = document.with_file_name(name);
    }

    match state.processor.process(document).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            let status = match &e {
                PipelineError::EmptyDocument { .. } => StatusCode::BAD_REQUEST,
                PipelineError::RunInProgress => StatusCode::CONFLICT,
                PipelineError::Stage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(error = %e, status = status.as_u16(), "Document rejected");
            (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
        }
    }
}

// ── Run log ─────────────────────────────────────────────────────────────

async fn list_log(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.run_log.entries().await)
}

async fn list_router_log(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.run_log.entries_for(AgentName::ActionRouter).await)
}

async fn clear_log(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.run_log.clear().await;
    Json(serde_json::json!({ "cleared": cleared }))
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("Log WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.run_log))
}

async fn send_event(socket: &mut WebSocket, event: &LogEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize log event");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, run_log: Arc<RunLog>) {
    info!("Log WebSocket client connected");

    // Subscribe before the snapshot so no append falls between them
    let mut rx = run_log.subscribe();

    let sync = LogEvent::LogSync {
        entries: run_log.entries().await,
    };
    if !send_event(&mut socket, &sync).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Log WS client lagged behind broadcast");
                        let sync = LogEvent::LogSync {
                            entries: run_log.entries().await,
                        };
                        if !send_event(&mut socket, &sync).await {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, &run_log).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Log WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Log WebSocket connection closed");
}

async fn handle_client_message(text: &str, run_log: &RunLog) {
    match serde_json::from_str::<LogCommand>(text) {
        Ok(LogCommand::Clear) => {
            let removed = run_log.clear().await;
            info!(removed, "Run log cleared via WS");
        }
        Err(e) => {
            debug!(error = %e, text = text, "Unrecognized WS message from client");
        }
    }
}
