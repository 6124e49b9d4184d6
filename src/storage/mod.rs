//! External store subsystem.
//!
//! # Data Flow
//! ```text
//! CacheStore / IdempotencyStore (cache.rs)
//!     → KeyValueStore (kv.rs in memory, redis.rs behind `redis-store`)
//!
//! DurableLogger (audit::logger)
//!     → LogStore (log_store.rs in memory, sqlite.rs behind `sqlite-store`)
//! ```
//!
//! # Design Decisions
//! - Backends sit behind object-safe async traits so tests can inject faults
//! - Backends report raw `StoreError`s; resilience lives in the adapters
//! - A store that cannot connect at startup is replaced by `Unreachable`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audit::AuditRecord;
use crate::error::StoreError;

pub mod cache;
pub mod kv;
pub mod log_store;
#[cfg(feature = "redis-store")]
pub mod redis;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

pub use cache::{CacheStore, IdempotencyStore};
pub use kv::MemoryKvStore;
pub use log_store::MemoryLogStore;

/// Key-value service holding cache entries and idempotency records.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, expiring after `ttl_secs`.
    async fn set_ex(&self, key: &str, ttl_secs: u64, value: &str) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Durable request log.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Insert one record. A repeated `request_id` yields `StoreError::Duplicate`.
    async fn insert(&self, record: &AuditRecord) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<LogStats, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Aggregate statistics over every logged request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogStats {
    pub total_requests: u64,
    pub success_count: u64,
    pub success_rate: f64,
    pub cache_hits: u64,
    pub cache_hit_rate: f64,
    pub avg_processing_time_ms: f64,
}

impl LogStats {
    /// Derive rates from raw counts.
    pub fn from_counts(total: u64, successes: u64, cache_hits: u64, avg_processing_time_ms: f64) -> Self {
        let rate = |n: u64| if total == 0 { 0.0 } else { n as f64 / total as f64 };
        Self {
            total_requests: total,
            success_count: successes,
            success_rate: rate(successes),
            cache_hits,
            cache_hit_rate: rate(cache_hits),
            avg_processing_time_ms,
        }
    }
}

/// Stand-in for a backend that failed to connect at startup.
#[derive(Debug, Clone)]
pub struct Unreachable {
    dependency: &'static str,
    reason: String,
}

impl Unreachable {
    pub fn new(dependency: &'static str, reason: impl Into<String>) -> Self {
        Self {
            dependency,
            reason: reason.into(),
        }
    }

    fn error(&self) -> StoreError {
        StoreError::unavailable(self.dependency, self.reason.clone())
    }
}

#[async_trait]
impl KeyValueStore for Unreachable {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(self.error())
    }

    async fn set_ex(&self, _key: &str, _ttl_secs: u64, _value: &str) -> Result<(), StoreError> {
        Err(self.error())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(self.error())
    }
}

#[async_trait]
impl LogStore for Unreachable {
    async fn insert(&self, _record: &AuditRecord) -> Result<(), StoreError> {
        Err(self.error())
    }

    async fn stats(&self) -> Result<LogStats, StoreError> {
        Err(self.error())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(self.error())
    }
}
