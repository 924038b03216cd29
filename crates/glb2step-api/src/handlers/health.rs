//! Health check handler.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use glb2step_pipeline::MetricsSnapshot;

use crate::state::AppState;

/// Liveness payload with pipeline counters.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub jobs: MetricsSnapshot,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        jobs: state.pipeline.metrics().snapshot(),
    })
}
