//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect the key-value and log stores named by config
//! - Load the classifier
//! - Build one breaker per dependency and wire the adapters around them
//! - Start background tasks (buffer flusher)
//!
//! # Design Decisions
//! - An unreachable store is not fatal: it is replaced by `Unreachable` and
//!   the service runs degraded (cache misses, buffered logs)
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::audit::DurableLogger;
use crate::config::{KvBackend, LogBackend, ServerConfig};
use crate::inference::{load_classifier, Classifier, RequestOrchestrator};
use crate::lifecycle::Shutdown;
use crate::resilience::{CircuitBreaker, CircuitSnapshot, RetryExecutor, RetryPolicy};
use crate::storage::cache::KvAccess;
use crate::storage::{
    CacheStore, IdempotencyStore, KeyValueStore, LogStore, MemoryKvStore, MemoryLogStore,
    Unreachable,
};

/// Every long-lived component, constructed once and shared via `Arc`.
pub struct Services {
    pub config: Arc<ServerConfig>,
    pub orchestrator: Arc<RequestOrchestrator>,
    pub logger: Arc<DurableLogger>,
    pub kv: KvAccess,
    pub started_at: std::time::Instant,
}

impl Services {
    /// Connect configured backends and load the model.
    pub async fn build(config: ServerConfig) -> Self {
        let kv_store = connect_kv(&config).await;
        let log_store = connect_log_store(&config).await;
        let classifier: Arc<dyn Classifier> = Arc::new(load_classifier(&config.model).await);
        Self::with_components(config, kv_store, log_store, classifier)
    }

    /// Wire already-constructed components.
    pub fn with_components(
        config: ServerConfig,
        kv_store: Arc<dyn KeyValueStore>,
        log_store: Arc<dyn LogStore>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let retry = RetryExecutor::new(RetryPolicy::from(&config.retries));
        let kv_breaker = Arc::new(CircuitBreaker::new("kv", config.circuit_breaker.clone()));
        let log_breaker = Arc::new(CircuitBreaker::new(
            "log_store",
            config.circuit_breaker.clone(),
        ));

        let kv = KvAccess::new(
            kv_store,
            kv_breaker,
            retry.clone(),
            Duration::from_millis(config.timeouts.kv_ms),
        );
        let cache = CacheStore::new(kv.clone(), config.cache.clone());
        let idempotency = IdempotencyStore::new(kv.clone(), config.idempotency.clone());

        let logger = Arc::new(DurableLogger::new(
            log_store,
            log_breaker,
            retry,
            Duration::from_millis(config.timeouts.log_store_ms),
            config.fallback_buffer.capacity,
        ));

        let orchestrator = Arc::new(RequestOrchestrator::new(
            classifier,
            cache,
            idempotency,
            logger.clone(),
            config.server.worker_id.clone(),
            Duration::from_millis(config.timeouts.inference_ms),
        ));

        tracing::info!(
            worker_id = %config.server.worker_id,
            cache_enabled = config.cache.enabled,
            idempotency_enabled = config.idempotency.enabled,
            breaker_enabled = config.circuit_breaker.enabled,
            "Services initialized"
        );

        Self {
            config: Arc::new(config),
            orchestrator,
            logger,
            kv,
            started_at: std::time::Instant::now(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.config.server.worker_id
    }

    /// Snapshots of every dependency breaker.
    pub fn circuits(&self) -> Vec<CircuitSnapshot> {
        vec![
            self.kv.breaker().snapshot(),
            self.logger.breaker().snapshot(),
        ]
    }

    /// Spawn the periodic buffer flusher.
    pub fn spawn_background(&self, shutdown: &Shutdown) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.fallback_buffer.flush_interval_secs);
        tokio::spawn(self.logger.clone().run_flusher(interval, shutdown.subscribe()))
    }
}

async fn connect_kv(config: &ServerConfig) -> Arc<dyn KeyValueStore> {
    match config.kv_store.backend {
        KvBackend::Memory => {
            tracing::info!("Using in-memory key-value store");
            Arc::new(MemoryKvStore::new())
        }
        #[cfg(feature = "redis-store")]
        KvBackend::Redis => {
            let timeout = Duration::from_millis(config.timeouts.kv_ms);
            let connect = crate::storage::redis::RedisKvStore::connect(&config.kv_store.url);
            match crate::resilience::timeouts::with_store_timeout("kv", timeout, connect).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    tracing::warn!(error = %e, "Key-value store unreachable, running without cache");
                    Arc::new(Unreachable::new("kv", e.to_string()))
                }
            }
        }
        #[cfg(not(feature = "redis-store"))]
        KvBackend::Redis => {
            tracing::warn!("Redis backend requested but built without the redis-store feature");
            Arc::new(Unreachable::new("kv", "redis-store feature not enabled"))
        }
    }
}

async fn connect_log_store(config: &ServerConfig) -> Arc<dyn LogStore> {
    match config.log_store.backend {
        LogBackend::Memory => {
            tracing::info!("Using in-memory log store");
            Arc::new(MemoryLogStore::new())
        }
        #[cfg(feature = "sqlite-store")]
        LogBackend::Sqlite => {
            let timeout = Duration::from_millis(config.timeouts.log_store_ms);
            let connect = crate::storage::sqlite::SqliteLogStore::connect(&config.log_store.url);
            match crate::resilience::timeouts::with_store_timeout("log_store", timeout, connect).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    tracing::warn!(error = %e, "Log store unreachable, logs will be buffered");
                    Arc::new(Unreachable::new("log_store", e.to_string()))
                }
            }
        }
        #[cfg(not(feature = "sqlite-store"))]
        LogBackend::Sqlite => {
            tracing::warn!("SQLite backend requested but built without the sqlite-store feature");
            Arc::new(Unreachable::new("log_store", "sqlite-store feature not enabled"))
        }
    }
}
