use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use chained_actions::api;
use chained_actions::config::AppConfig;
use chained_actions::dispatch::{ActionDispatcher, HttpDispatcher, SimulatedDispatcher};
use chained_actions::gateway::{InferenceGateway, LlmGateway};
use chained_actions::llm::create_provider;
use chained_actions::pipeline::DocumentProcessor;
use chained_actions::runlog::RunLog;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...  (or set CHAINED_ACTIONS_LLM_BACKEND=openai and OPENAI_API_KEY)");
        std::process::exit(1);
    });

    // Initialize tracing: stderr always, plus a daily file when a log dir is set
    let mut _log_guard: Option<tracing_appender::non_blocking::WorkerGuard> = None;
    let file_layer = config.log_dir.as_ref().map(|dir| {
        let file_appender = tracing_appender::rolling::daily(dir, "chained-actions.log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        _log_guard = Some(guard);
        tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_filter(env_filter())
    });
    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(env_filter()),
        )
        .init();

    eprintln!("⛓️  Chained Actions v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   API: http://0.0.0.0:{}/api/process", config.port);
    eprintln!("   Log WS: ws://0.0.0.0:{}/ws/log", config.port);

    // ── Collaborators ────────────────────────────────────────────────────
    let llm = create_provider(&config.llm).context("creating LLM provider")?;
    let gateway: Arc<dyn InferenceGateway> = Arc::new(LlmGateway::new(llm, config.gateway));

    let dispatcher: Arc<dyn ActionDispatcher> = match config.dispatch_url {
        Some(ref url) => {
            eprintln!("   Dispatch: {url}");
            Arc::new(HttpDispatcher::new(url.clone()))
        }
        None => {
            eprintln!("   Dispatch: simulated");
            Arc::new(SimulatedDispatcher::new())
        }
    };

    let run_log = RunLog::new();
    let processor = Arc::new(DocumentProcessor::new(gateway, dispatcher, run_log));

    // ── Server ───────────────────────────────────────────────────────────
    let app = api::routes(processor);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(port = config.port, "Chained Actions server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("serving HTTP")?;

    Ok(())
}
