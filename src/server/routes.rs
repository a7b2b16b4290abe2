//! Route handlers

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::domain::StatusRecord;
use crate::pipeline::LoopRequest;

const DEFAULT_REASON: &str = "manual_trigger";

/// Body of `POST /system-agent/trigger`
#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

impl TriggerRequest {
    /// Lenient parse: an empty or malformed body means the default reason
    fn from_body(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        serde_json::from_slice(body).unwrap_or_else(|e| {
            log::warn!("Ignoring malformed trigger body: {}", e);
            Self::default()
        })
    }

    fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_REASON)
    }
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/cron/loop", post(cron_loop))
        .route("/cron/strategize", post(cron_strategize))
        .route("/system-agent/trigger", post(system_agent_trigger))
}

async fn health() -> &'static str {
    "ok"
}

/// GET /status - the persisted status record
async fn status(State(state): State<AppState>) -> Result<Json<StatusRecord>, StatusCode> {
    state.orchestrator.status().map(Json).map_err(|e| {
        log::error!("Status read failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// POST /cron/loop - start a loop in the background
async fn cron_loop(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.orchestrator.request_loop() {
        LoopRequest::Started(_) => (StatusCode::ACCEPTED, "Loop started."),
        LoopRequest::AlreadyRunning => (StatusCode::ACCEPTED, "Loop already running."),
        LoopRequest::Failed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to start loop."),
    }
}

/// POST /cron/strategize - blocks until the new mission is written
async fn cron_strategize(State(state): State<AppState>) -> (StatusCode, String) {
    match state.orchestrator.strategize().await {
        Ok(_) => (StatusCode::OK, "Strategist run complete.".to_string()),
        Err(e) => {
            log::error!("Strategist failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Strategist failed: {}", e))
        }
    }
}

/// POST /system-agent/trigger - manual self-repair
async fn system_agent_trigger(State(state): State<AppState>, body: Bytes) -> Response {
    let request = TriggerRequest::from_body(&body);
    match state.orchestrator.escalate(request.reason()).await {
        Ok(diagnosis) => Json(diagnosis).into_response(),
        Err(e) => {
            log::error!("System agent failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "System agent failed" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_reason_defaults() {
        assert_eq!(TriggerRequest::from_body(b"").reason(), DEFAULT_REASON);
        assert_eq!(TriggerRequest::from_body(b"{}").reason(), DEFAULT_REASON);
        assert_eq!(TriggerRequest::from_body(b"not json").reason(), DEFAULT_REASON);
        assert_eq!(TriggerRequest::from_body(br#"{"reason":"  "}"#).reason(), DEFAULT_REASON);
        assert_eq!(
            TriggerRequest::from_body(br#"{"reason":"disk full"}"#).reason(),
            "disk full"
        );
    }
}
