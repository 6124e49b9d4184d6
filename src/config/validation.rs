//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, capacities > 0)
//! - Validate addresses and store URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ConfigViolation>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{KvBackend, LogBackend, ServerConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ConfigViolation {
    pub field: &'static str,
    pub message: String,
}

impl ConfigViolation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every violation.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigViolation>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ConfigViolation::new(
            "server.bind_address",
            format!("not a socket address: {}", config.server.bind_address),
        ));
    }
    if config.server.worker_id.trim().is_empty() {
        errors.push(ConfigViolation::new("server.worker_id", "must not be empty"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ConfigViolation::new("server.request_timeout_secs", "must be > 0"));
    }
    if config.server.max_body_bytes == 0 {
        errors.push(ConfigViolation::new("server.max_body_bytes", "must be > 0"));
    }

    if config.cache.enabled && config.cache.ttl_secs == 0 {
        errors.push(ConfigViolation::new("cache.ttl_secs", "must be > 0 when caching is enabled"));
    }
    if config.idempotency.enabled && config.idempotency.ttl_secs == 0 {
        errors.push(ConfigViolation::new(
            "idempotency.ttl_secs",
            "must be > 0 when idempotency is enabled",
        ));
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ConfigViolation::new("circuit_breaker.failure_threshold", "must be > 0"));
    }
    if breaker.half_open_probe_count == 0 {
        errors.push(ConfigViolation::new(
            "circuit_breaker.half_open_probe_count",
            "must be > 0",
        ));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ConfigViolation::new("retries.max_attempts", "must be >= 1"));
    }
    if retries.multiplier == 0 {
        errors.push(ConfigViolation::new("retries.multiplier", "must be >= 1"));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ConfigViolation::new(
            "retries.base_delay_ms",
            format!(
                "base delay {}ms exceeds max delay {}ms",
                retries.base_delay_ms, retries.max_delay_ms
            ),
        ));
    }

    if config.fallback_buffer.capacity == 0 {
        errors.push(ConfigViolation::new("fallback_buffer.capacity", "must be > 0"));
    }

    if config.kv_store.backend == KvBackend::Redis {
        check_url(&mut errors, "kv_store.url", &config.kv_store.url, &["redis", "rediss"]);
    }
    if config.log_store.backend == LogBackend::Sqlite {
        check_url(&mut errors, "log_store.url", &config.log_store.url, &["sqlite"]);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ConfigViolation::new(
            "observability.metrics_address",
            format!("not a socket address: {}", config.observability.metrics_address),
        ));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_minute == 0 {
            errors.push(ConfigViolation::new("rate_limit.requests_per_minute", "must be > 0"));
        }
        if config.rate_limit.burst == 0 {
            errors.push(ConfigViolation::new("rate_limit.burst", "must be > 0"));
        }
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ConfigViolation::new("admin.api_key", "must be set when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ConfigViolation>, field: &'static str, raw: &str, schemes: &[&str]) {
    match Url::parse(raw) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ConfigViolation::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ConfigViolation::new(field, format!("invalid URL: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_violation() {
        let mut config = ServerConfig::default();
        config.server.bind_address = "not-an-address".into();
        config.circuit_breaker.failure_threshold = 0;
        config.retries.base_delay_ms = 10_000;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "circuit_breaker.failure_threshold",
                "retries.base_delay_ms"
            ]
        );
    }

    #[test]
    fn store_urls_checked_only_for_selected_backend() {
        let mut config = ServerConfig::default();
        config.kv_store.url = "http://wrong".into();
        assert!(validate_config(&config).is_ok());

        config.kv_store.backend = KvBackend::Redis;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "kv_store.url");
    }

    #[test]
    fn sqlite_memory_url_is_accepted() {
        let mut config = ServerConfig::default();
        config.log_store.backend = LogBackend::Sqlite;
        config.log_store.url = "sqlite::memory:".into();
        assert!(validate_config(&config).is_ok());
    }
}
