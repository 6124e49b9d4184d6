use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::audit::BufferSnapshot;
use crate::http::server::AppState;
use crate::resilience::CircuitSnapshot;
use crate::storage::LogStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub worker_id: String,
    pub uptime_seconds: f64,
    pub model_loaded: bool,
}

#[derive(Serialize)]
pub struct FlushResult {
    pub flushed: usize,
    pub remaining: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let services = &state.services;
    let degraded = services.logger.buffer().active
        || services
            .circuits()
            .iter()
            .any(|c| c.state != crate::resilience::CircuitState::Closed);

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if degraded { "degraded" } else { "operational" },
        worker_id: services.worker_id().to_string(),
        uptime_seconds: services.started_at.elapsed().as_secs_f64(),
        model_loaded: services.orchestrator.classifier().is_ready(),
    })
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<LogStats>, (StatusCode, String)> {
    state.services.logger.stats().await.map(Json).map_err(|e| {
        tracing::warn!(error = %e, "Failed to read log stats");
        (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })
}

pub async fn get_circuits(State(state): State<AppState>) -> Json<Vec<CircuitSnapshot>> {
    Json(state.services.circuits())
}

pub async fn get_buffer(State(state): State<AppState>) -> Json<BufferSnapshot> {
    Json(state.services.logger.buffer())
}

pub async fn flush_buffer(State(state): State<AppState>) -> Json<FlushResult> {
    let flushed = state.services.logger.flush().await;
    tracing::info!(flushed = flushed, "Manual log buffer flush");
    Json(FlushResult {
        flushed,
        remaining: state.services.logger.buffer().depth,
    })
}
