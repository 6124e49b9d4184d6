//! Admin API under `/admin`, bearer-token protected.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/stats", get(get_stats))
        .route("/admin/circuits", get(get_circuits))
        .route("/admin/buffer", get(get_buffer))
        .route("/admin/flush", post(flush_buffer))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
