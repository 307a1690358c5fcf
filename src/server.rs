//! HTTP surface: direct tool calls, Slack event intake and manual job
//! triggers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::JobError;
use crate::jobs::{ChatWorker, JobKind, JobRunner, SlackEvent};
use crate::tools::{Dispatcher, ToolArguments};

/// Slack requests older than this are treated as replays.
const MAX_SLACK_REQUEST_AGE: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<dyn Dispatcher>,
    pub jobs: Arc<JobRunner>,
    /// `None` when Slack or the chat assistant is not configured.
    pub chat: Option<Arc<ChatWorker>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallRequest {
    function_name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct SlackEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    event: Option<SlackEvent>,
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// POST /tool-call
///
/// `arguments` may be an object or its serialized string form.
async fn tool_call(
    State(state): State<AppState>,
    Json(request): Json<ToolCallRequest>,
) -> impl IntoResponse {
    tracing::info!(function = %request.function_name, "Direct tool call");
    let arguments = match request.arguments {
        Value::String(raw) => ToolArguments::Raw(raw),
        other => ToolArguments::Value(other),
    };
    let envelope = state
        .dispatcher
        .dispatch(&request.function_name, arguments)
        .await;
    let status =
        StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope.body))
}

/// Whether the `x-slack-request-timestamp` header is older than the replay
/// window. A missing or unreadable header is not treated as stale.
fn is_stale(headers: &HeaderMap, now: i64) -> bool {
    headers
        .get("x-slack-request-timestamp")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .is_some_and(|ts| ts < now - MAX_SLACK_REQUEST_AGE.as_secs() as i64)
}

/// POST /slack/events
async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(envelope): Json<SlackEnvelope>,
) -> impl IntoResponse {
    if is_stale(&headers, Utc::now().timestamp()) {
        tracing::warn!("Rejecting stale Slack request");
        return (StatusCode::BAD_REQUEST, "Ignore this request (too old)").into_response();
    }

    match envelope.kind.as_str() {
        "url_verification" => Json(json!({ "challenge": envelope.challenge })).into_response(),
        "event_callback" => {
            match (envelope.event, state.chat) {
                (Some(event), Some(chat)) => {
                    // Slack retries unless it hears back quickly.
                    tokio::spawn(async move {
                        let disposition = chat.handle(&event).await;
                        tracing::debug!(?disposition, "Slack event handled");
                    });
                }
                (Some(_), None) => tracing::warn!("Slack event received but chat is not configured"),
                (None, _) => tracing::warn!("Slack event_callback without an event"),
            }
            (StatusCode::OK, "Event received").into_response()
        }
        other => {
            tracing::debug!(kind = other, "Ignoring Slack request");
            (StatusCode::OK, "Event received").into_response()
        }
    }
}

/// POST /jobs/{name}
async fn run_job(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    let Some(kind) = JobKind::from_name(&name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": JobError::UnknownJob(name).to_string() })),
        )
            .into_response();
    };

    match state.jobs.run(kind).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::error!(job = %kind, error = %e, "Manual job run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tool-call", post(tool_call))
        .route("/slack/events", post(slack_events))
        .route("/jobs/{name}", post(run_job))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the configured port and serve until `shutdown` resolves.
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "HTTP server started");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
