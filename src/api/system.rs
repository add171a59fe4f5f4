//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;
use crate::lifecycle::LifecycleState;

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    lifecycle: LifecycleState,
    active_subscriptions: usize,
    timestamp: String,
    version: &'static str,
}

/// `GET /health`: service health and lifecycle state.
///
/// Answers `200` while listening and `503` once draining has begun.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let lifecycle = state.lifecycle.current();
    let (code, status) = if lifecycle == LifecycleState::Listening {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };
    (
        code,
        Json(HealthResponse {
            status,
            lifecycle,
            active_subscriptions: state.subscriptions.active(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
