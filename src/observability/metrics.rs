//! Metrics collection and exposition.
//!
//! # Metrics
//! - `inference_requests_total` (counter): requests by status, cache_hit (true/false/idempotency)
//! - `inference_request_duration_seconds` (histogram): end-to-end latency
//! - `inference_duration_seconds` (histogram): model time only
//! - `inference_errors_total` (counter): failures by error_type
//! - `cache_hits_total` / `cache_misses_total` (counter)
//! - `idempotency_hits_total` / `idempotency_misses_total` (counter)
//! - `cache_errors_total` (counter): adapter failures by operation
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `circuit_breaker_successes_total` / `circuit_breaker_failures_total` (counter)
//! - `retry_attempts_total` (counter): scheduled retries by operation
//! - `fallback_triggered_total` (counter): by dependency, fallback_type
//! - `fallback_buffer_depth` (gauge), `fallback_logs_dropped_total` (counter)
//! - `model_load_duration_seconds` (gauge)
//! - `rate_limited_requests_total` (counter)
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op, so tests need no setup
//! - Labels are low-cardinality names only, never request data

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Where a response came from; the `cache_hit` label of `inference_requests_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Model,
    Cache,
    Idempotency,
}

impl ResponseSource {
    pub fn from_cache_hit(cache_hit: bool) -> Self {
        if cache_hit {
            ResponseSource::Cache
        } else {
            ResponseSource::Model
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            ResponseSource::Model => "false",
            ResponseSource::Cache => "true",
            ResponseSource::Idempotency => "idempotency",
        }
    }
}

pub fn record_request(status: &'static str, source: ResponseSource, start: Instant) {
    counter!("inference_requests_total", "status" => status, "cache_hit" => source.as_label())
        .increment(1);
    histogram!("inference_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_inference_duration(elapsed: Duration) {
    histogram!("inference_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_error(error_type: &'static str) {
    counter!("inference_errors_total", "error_type" => error_type).increment(1);
}

/// `store` is "cache" or "idempotency".
pub fn record_lookup(store: &'static str, hit: bool) {
    match (store, hit) {
        ("idempotency", true) => counter!("idempotency_hits_total").increment(1),
        ("idempotency", false) => counter!("idempotency_misses_total").increment(1),
        (_, true) => counter!("cache_hits_total").increment(1),
        (_, false) => counter!("cache_misses_total").increment(1),
    }
}

pub fn record_cache_error(operation: &'static str) {
    counter!("cache_errors_total", "operation" => operation).increment(1);
}

pub fn record_circuit_state(dependency: &str, state: f64) {
    gauge!("circuit_breaker_state", "dependency" => dependency.to_string()).set(state);
}

pub fn record_circuit_call(dependency: &str, success: bool) {
    if success {
        counter!("circuit_breaker_successes_total", "dependency" => dependency.to_string())
            .increment(1);
    } else {
        counter!("circuit_breaker_failures_total", "dependency" => dependency.to_string())
            .increment(1);
    }
}

pub fn record_retry(operation: &str) {
    counter!("retry_attempts_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_fallback(dependency: &'static str, fallback_type: &'static str) {
    counter!(
        "fallback_triggered_total",
        "dependency" => dependency,
        "fallback_type" => fallback_type
    )
    .increment(1);
}

pub fn record_buffer_depth(depth: usize) {
    gauge!("fallback_buffer_depth").set(depth as f64);
}

pub fn record_log_dropped() {
    counter!("fallback_logs_dropped_total").increment(1);
}

pub fn record_model_load(elapsed: Duration) {
    gauge!("model_load_duration_seconds").set(elapsed.as_secs_f64());
}

pub fn record_rate_limited(reason: &'static str) {
    counter!("rate_limited_requests_total", "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_have_their_own_label() {
        assert_eq!(ResponseSource::from_cache_hit(true).as_label(), "true");
        assert_eq!(ResponseSource::from_cache_hit(false).as_label(), "false");
        assert_eq!(ResponseSource::Idempotency.as_label(), "idempotency");
    }
}
