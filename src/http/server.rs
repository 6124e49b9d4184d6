//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the inference, probe and admin handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit, rate limit)
//! - Bind the server to a listener and stop on the shutdown signal
//!
//! # Design Decisions
//! - Request ID is set outermost so every span and response carries it
//! - Rate limiting only guards `/infer`; probes must stay reachable

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::health::{healthz, readyz};
use crate::http::handlers::infer;
use crate::lifecycle::Services;
use crate::security::{rate_limit_middleware, RateLimiterState};

/// Idle rate-limit buckets older than this are pruned.
const RATE_LIMIT_IDLE: Duration = Duration::from_secs(600);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

/// HTTP server for the inference API.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(services: Arc<Services>) -> Self {
        let rate_limiter = services
            .config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiterState::new(&services.config.rate_limit)));

        Self {
            state: AppState {
                services,
                rate_limiter,
            },
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let config = &self.state.services.config;

        let mut inference = Router::new().route("/infer", post(infer));
        if let Some(limiter) = &self.state.rate_limiter {
            inference = inference.route_layer(middleware::from_fn_with_state(
                limiter.clone(),
                rate_limit_middleware,
            ));
        }

        let mut app = Router::new()
            .merge(inference)
            .route("/healthz", get(healthz))
            .route("/readyz", get(readyz));

        if config.admin.enabled {
            app = app.merge(admin::setup_admin_router(self.state.clone()));
        }

        app.with_state(self.state.clone()).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_secs,
                ))),
        )
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            worker_id = %self.state.services.worker_id(),
            "HTTP server starting"
        );

        if let Some(limiter) = self.state.rate_limiter.clone() {
            let mut stop = shutdown.resubscribe();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(RATE_LIMIT_IDLE);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let pruned = limiter.prune(RATE_LIMIT_IDLE);
                            if pruned > 0 {
                                tracing::debug!(pruned = pruned, "Pruned idle rate limit buckets");
                            }
                        }
                        _ = stop.recv() => break,
                    }
                }
            });
        }

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
