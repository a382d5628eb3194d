//! REST endpoints: message intake and health.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::pipeline::dispatcher::Dispatcher;
use crate::pipeline::types::IncomingMessage;

/// Acknowledgement body for accepted messages.
pub const ACCEPTED_MESSAGE: &str = "Request accepted and is being processed.";

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
}

/// POST /process-message
///
/// Accepts `{ "channel_id", "body" }` and answers 202 before the pipeline
/// runs. The caller never sees the pipeline outcome. A full or closed
/// dispatch queue answers 503.
async fn process_message(
    State(state): State<ApiState>,
    Json(message): Json<IncomingMessage>,
) -> Response {
    debug!(channel = %message.channel_id, "Message received");
    match state.dispatcher.submit(message).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "message": ACCEPTED_MESSAGE })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// GET /health
///
/// Only reachable once the rule set loaded, so "ok" implies ready.
async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "rules": state.dispatcher.processor().rules().len(),
        "stats": state.dispatcher.stats(),
    }))
}

/// Build the API routes.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/process-message", post(process_message))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
