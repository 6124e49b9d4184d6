//! Liveness and readiness probes.
//!
//! # Design Decisions
//! - Liveness never touches dependencies
//! - Readiness depends on the model only; store availability is reported but
//!   does not fail the probe, since the service degrades instead of failing

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub worker_id: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub worker_id: String,
    pub checks: BTreeMap<String, bool>,
    pub timestamp: DateTime<Utc>,
}

/// `GET /healthz`
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        worker_id: state.services.worker_id().to_string(),
        timestamp: Utc::now(),
        uptime_seconds: state.services.started_at.elapsed().as_secs_f64(),
    })
}

/// `GET /readyz`
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let services = &state.services;
    let model_loaded = services.orchestrator.classifier().is_ready();
    let (cache_available, database_available) =
        tokio::join!(services.kv.ping(), services.logger.ping());

    let checks = BTreeMap::from([
        ("model_loaded".to_string(), model_loaded),
        ("cache_available".to_string(), cache_available),
        ("database_available".to_string(), database_available),
    ]);

    let status = if model_loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: model_loaded,
            worker_id: services.worker_id().to_string(),
            checks,
            timestamp: Utc::now(),
        }),
    )
}
