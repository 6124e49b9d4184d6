//! Inference Server
//!
//! A text-classification service that keeps answering when its caches and
//! audit store do not.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ orchestrator ──▶ idempotency check (kv)
//!                                          │          ──▶ cache lookup     (kv)
//!                                          │          ──▶ classifier
//!                                          │          ──▶ cache store      (kv)
//!                                          │          ──▶ idempotency store(kv)
//!                                          ▼
//!                                   durable logger ──▶ log store
//!                                          │
//!                                          └──▶ fallback buffer ──▶ flusher
//!
//!     Cross-cutting: config, observability, resilience (breaker/retry/timeout),
//!                    lifecycle (startup/shutdown), security (rate limit), admin
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use inference_server::config::load_or_default;
use inference_server::lifecycle::{signals::wait_for_signal, teardown, Services, Shutdown};
use inference_server::observability::{logging, metrics};
use inference_server::HttpServer;

#[derive(Parser)]
#[command(name = "inference-server")]
#[command(about = "Resilient text-classification inference server", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "INFERENCE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "inference-server starting");

    tracing::info!(
        bind_address = %config.server.bind_address,
        worker_id = %config.server.worker_id,
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let grace = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let services = Arc::new(Services::build(config).await);
    let shutdown = Shutdown::new();
    let flusher = services.spawn_background(&shutdown);

    let server = HttpServer::new(services.clone());
    let mut server_handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = wait_for_signal() => {}
        result = &mut server_handle => {
            tracing::error!(result = ?result, "HTTP server exited unexpectedly");
        }
    }

    shutdown.trigger();
    if !server_handle.is_finished() {
        if tokio::time::timeout(grace, &mut server_handle).await.is_err() {
            tracing::warn!(grace_secs = grace.as_secs(), "Graceful shutdown timed out, aborting");
            server_handle.abort();
        }
    }
    let _ = flusher.await;

    teardown(&services).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
