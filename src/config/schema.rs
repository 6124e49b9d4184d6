//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the inference
//! server. All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the inference server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener and request handling settings.
    pub server: ListenerConfig,

    /// Classification model bootstrap.
    pub model: ModelConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Idempotent replay settings.
    pub idempotency: IdempotencyConfig,

    /// Circuit breaker settings, shared by every dependency.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Per-dependency operation deadlines.
    pub timeouts: TimeoutConfig,

    /// Audit log fallback buffer.
    pub fallback_buffer: FallbackBufferConfig,

    /// Key-value store backend.
    pub kv_store: KvStoreConfig,

    /// Audit log store backend.
    pub log_store: LogStoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Admin API configuration.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Identifier reported in responses, logs and audit records.
    pub worker_id: String,

    /// Total time allowed for one HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// How long shutdown waits for in-flight requests.
    pub graceful_shutdown_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            worker_id: "worker-1".to_string(),
            request_timeout_secs: 30,
            graceful_shutdown_timeout_secs: 30,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Model bootstrap configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to a JSON model file. Missing file falls back to the built-in model.
    pub path: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: Some("models/classifier.json".to_string()),
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
        }
    }
}

/// Idempotency configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 86_400,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// When false every breaker passes calls straight through.
    pub enabled: bool,

    /// Consecutive failures while closed before the circuit opens.
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before allowing a probe.
    pub open_timeout_secs: u64,

    /// Successful probes required in half-open before closing.
    pub half_open_probe_count: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            open_timeout_secs: 60,
            half_open_probe_count: 3,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor applied per attempt.
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            multiplier: 2,
        }
    }
}

/// Timeout configuration for dependency calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Key-value store operation timeout in milliseconds.
    pub kv_ms: u64,

    /// Log store operation timeout in milliseconds.
    pub log_store_ms: u64,

    /// Model inference timeout in milliseconds.
    pub inference_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            kv_ms: 2_000,
            log_store_ms: 5_000,
            inference_ms: 10_000,
        }
    }
}

/// Fallback buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackBufferConfig {
    /// Maximum buffered audit records before the oldest is dropped.
    pub capacity: usize,

    /// Background flush interval in seconds (0 disables the flusher).
    pub flush_interval_secs: u64,
}

impl Default for FallbackBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            flush_interval_secs: 30,
        }
    }
}

/// Which key-value store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KvBackend {
    Memory,
    Redis,
}

/// Key-value store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KvStoreConfig {
    pub backend: KvBackend,

    /// Connection URL (e.g., "redis://127.0.0.1:6379/0").
    pub url: String,
}

impl Default for KvStoreConfig {
    fn default() -> Self {
        Self {
            backend: KvBackend::Memory,
            url: "redis://127.0.0.1:6379/0".to_string(),
        }
    }
}

/// Which log store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogBackend {
    Memory,
    Sqlite,
}

/// Log store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogStoreConfig {
    pub backend: LogBackend,

    /// Connection URL (e.g., "sqlite://data/inference.db").
    pub url: String,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            backend: LogBackend::Memory,
            url: "sqlite://inference_logs.db".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per minute per client IP.
    pub requests_per_minute: u32,

    /// Burst capacity.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_minute: 1000,
            burst: 100,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.idempotency.ttl_secs, 86_400);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.open_timeout(), Duration::from_secs(60));
        assert_eq!(config.circuit_breaker.half_open_probe_count, 3);
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.retries.max_delay_ms, 5000);
        assert_eq!(config.fallback_buffer.capacity, 1000);
        assert_eq!(config.kv_store.backend, KvBackend::Memory);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [cache]
            ttl_secs = 60

            [log_store]
            backend = "sqlite"
            url = "sqlite::memory:"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.cache.enabled);
        assert_eq!(config.log_store.backend, LogBackend::Sqlite);
        assert_eq!(config.server.worker_id, "worker-1");
    }
}
