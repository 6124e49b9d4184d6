//! Cache and idempotency adapters over the shared key-value store.
//!
//! # Responsibilities
//! - Namespace keys (`cache:<hash>`, `idempotency:<token>`)
//! - Attach the configured TTL at write time
//! - Wrap every call in timeout → retry → breaker
//!
//! # Design Decisions
//! - Never return an error: failures become a miss or "not stored"
//! - Both adapters share the single `kv` breaker
//! - Disabled adapters do not touch the breaker at all

use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, IdempotencyConfig};
use crate::error::StoreError;
use crate::observability::metrics;
use crate::resilience::timeouts::with_store_timeout;
use crate::resilience::{CircuitBreaker, RetryExecutor};
use crate::storage::KeyValueStore;

const DEPENDENCY: &str = "kv";

/// Resilient access path to the key-value store, shared by both adapters.
#[derive(Clone)]
pub struct KvAccess {
    store: Arc<dyn KeyValueStore>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    timeout: Duration,
}

impl KvAccess {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryExecutor,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            breaker,
            retry,
            timeout,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Health probe. Bypasses breaker and retries.
    pub async fn ping(&self) -> bool {
        with_store_timeout(DEPENDENCY, self.timeout, self.store.ping())
            .await
            .is_ok()
    }

    pub async fn close(&self) -> Result<(), StoreError> {
        self.store.close().await
    }

    async fn get(&self, key: &str, operation: &'static str, fallback_type: &'static str) -> Option<String> {
        let store = &self.store;
        let result = self
            .breaker
            .call_with_fallback(
                self.retry.run(operation, || {
                    with_store_timeout(DEPENDENCY, self.timeout, store.get(key))
                }),
                || async {
                    metrics::record_fallback(DEPENDENCY, fallback_type);
                    None
                },
            )
            .await;

        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(operation = operation, error = %e, "Key-value read failed, treating as miss");
                metrics::record_cache_error(operation);
                None
            }
        }
    }

    async fn set(&self, key: &str, ttl_secs: u64, value: &str, operation: &'static str) -> bool {
        let store = &self.store;
        let result = self
            .breaker
            .call_with_fallback(
                self.retry.run(operation, || {
                    with_store_timeout(DEPENDENCY, self.timeout, async move {
                        store.set_ex(key, ttl_secs, value).await.map(|_| true)
                    })
                }),
                || async {
                    metrics::record_fallback(DEPENDENCY, "skip_write");
                    false
                },
            )
            .await;

        match result {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(operation = operation, error = %e, "Key-value write failed, value not stored");
                metrics::record_cache_error(operation);
                false
            }
        }
    }
}

/// Response cache keyed by input hash.
#[derive(Clone)]
pub struct CacheStore {
    access: KvAccess,
    config: CacheConfig,
}

impl CacheStore {
    pub fn new(access: KvAccess, config: CacheConfig) -> Self {
        Self { access, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn key(hash: &str) -> String {
        format!("cache:{}", hash)
    }

    /// Cached value for `hash`, or `None` on miss, failure, or when disabled.
    pub async fn get(&self, hash: &str) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        let value = self
            .access
            .get(&Self::key(hash), "cache_get", "cache_miss")
            .await;
        metrics::record_lookup("cache", value.is_some());
        value
    }

    /// Store `value` under `hash` with the configured TTL. Returns whether it was written.
    pub async fn set(&self, hash: &str, value: &str) -> bool {
        if !self.config.enabled {
            return false;
        }
        self.access
            .set(&Self::key(hash), self.config.ttl_secs, value, "cache_set")
            .await
    }
}

/// Stored responses keyed by client-supplied idempotency token.
#[derive(Clone)]
pub struct IdempotencyStore {
    access: KvAccess,
    config: IdempotencyConfig,
}

impl IdempotencyStore {
    pub fn new(access: KvAccess, config: IdempotencyConfig) -> Self {
        Self { access, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn key(token: &str) -> String {
        format!("idempotency:{}", token)
    }

    /// Previously stored response for `token`, if any.
    pub async fn check(&self, token: &str) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        let value = self
            .access
            .get(&Self::key(token), "idempotency_check", "idempotency_miss")
            .await;
        metrics::record_lookup("idempotency", value.is_some());
        value
    }

    /// Remember `response` for `token` with the configured TTL.
    pub async fn store(&self, token: &str, response: &str) -> bool {
        if !self.config.enabled {
            return false;
        }
        self.access
            .set(
                &Self::key(token),
                self.config.ttl_secs,
                response,
                "idempotency_store",
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, RetryConfig};
    use crate::resilience::{CircuitState, RetryPolicy};
    use crate::storage::MemoryKvStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct DownStore {
        calls: AtomicU32,
    }

    #[async_trait]
    impl KeyValueStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::unavailable("kv", "connection refused"))
        }

        async fn set_ex(&self, _key: &str, _ttl: u64, _value: &str) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::unavailable("kv", "connection refused"))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::unavailable("kv", "connection refused"))
        }
    }

    fn access(store: Arc<dyn KeyValueStore>) -> KvAccess {
        let breaker = Arc::new(CircuitBreaker::new(
            "kv",
            CircuitBreakerConfig {
                failure_threshold: 2,
                ..Default::default()
            },
        ));
        let retry = RetryExecutor::new(RetryPolicy::from(&RetryConfig {
            max_attempts: 2,
            base_delay_ms: 10,
            ..Default::default()
        }));
        KvAccess::new(store, breaker, retry, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn cache_round_trip_uses_namespaced_key() {
        let kv = Arc::new(MemoryKvStore::new());
        let cache = CacheStore::new(access(kv.clone()), CacheConfig::default());

        assert_eq!(cache.get("abc").await, None);
        assert!(cache.set("abc", "{\"prediction\":\"positive\"}").await);
        assert_eq!(
            kv.get("cache:abc").await.unwrap().as_deref(),
            Some("{\"prediction\":\"positive\"}")
        );
        assert!(cache.get("abc").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_become_misses_and_open_the_shared_breaker() {
        let store = Arc::new(DownStore {
            calls: AtomicU32::new(0),
        });
        let access = access(store.clone());
        let cache = CacheStore::new(access.clone(), CacheConfig::default());
        let idempotency = IdempotencyStore::new(access.clone(), IdempotencyConfig::default());

        assert_eq!(cache.get("abc").await, None);
        assert!(!idempotency.store("tok", "{}").await);
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
        assert_eq!(access.breaker().state(), CircuitState::Open);

        // Short-circuited: the store is no longer called.
        assert_eq!(idempotency.check("tok").await, None);
        assert!(!cache.set("abc", "{}").await);
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_adapters_skip_the_store() {
        let store = Arc::new(DownStore {
            calls: AtomicU32::new(0),
        });
        let cache = CacheStore::new(
            access(store.clone()),
            CacheConfig {
                enabled: false,
                ttl_secs: 60,
            },
        );

        assert_eq!(cache.get("abc").await, None);
        assert!(!cache.set("abc", "{}").await);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }
}
