use std::sync::Arc;

use anyhow::Context;

use mailroom::api::{ApiState, api_routes};
use mailroom::config::ServiceConfig;
use mailroom::pipeline::{Dispatcher, EntityExtractor, MessageProcessor};
use mailroom::rules::load_config;
use mailroom::store::SimulatedDatabase;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env();

    eprintln!("📬 Mailroom v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Rules: {}", config.rules_path.display());

    // ── Rules ───────────────────────────────────────────────────────────
    // Loaded exactly once; a bad document means the service never becomes ready.
    let triage = load_config(&config.rules_path)
        .with_context(|| format!("loading intent rules from {}", config.rules_path.display()))?;
    eprintln!(
        "   Intents: {} ({} extraction patterns)",
        triage.rules.len(),
        triage.entities.len()
    );

    // ── Pipeline ────────────────────────────────────────────────────────
    let db = Arc::new(SimulatedDatabase::new());
    let processor = Arc::new(MessageProcessor::new(
        Arc::new(triage.rules),
        EntityExtractor::new(triage.entities),
        db.clone(),
        db,
    ));
    let dispatcher = Arc::new(Dispatcher::spawn(
        processor,
        config.workers,
        config.queue_capacity,
    ));
    eprintln!(
        "   Workers: {} (queue capacity {})",
        config.workers, config.queue_capacity
    );

    // ── HTTP ────────────────────────────────────────────────────────────
    let app = api_routes(ApiState {
        dispatcher: Arc::clone(&dispatcher),
    });
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    eprintln!("   API: http://{}/process-message\n", addr);
    tracing::info!(%addr, "Mailroom ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shutting down, draining pending messages");
    dispatcher.shutdown().await;

    Ok(())
}
