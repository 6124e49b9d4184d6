//! In-process log store.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::audit::AuditRecord;
use crate::error::StoreError;
use crate::storage::{LogStats, LogStore};

#[derive(Debug, Default)]
struct LogInner {
    records: Vec<AuditRecord>,
    request_ids: HashSet<String>,
}

/// `LogStore` keeping records in insertion order. Enforces unique request ids.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    inner: Mutex<LogInner>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored record, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner.lock().expect("log store mutex poisoned").records.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("log store mutex poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn insert(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("log store mutex poisoned");
        if !inner.request_ids.insert(record.request_id.clone()) {
            return Err(StoreError::Duplicate {
                dependency: "log_store",
                key: record.request_id.clone(),
            });
        }
        inner.records.push(record.clone());
        Ok(())
    }

    async fn stats(&self) -> Result<LogStats, StoreError> {
        let inner = self.inner.lock().expect("log store mutex poisoned");
        let total = inner.records.len() as u64;
        let successes = inner.records.iter().filter(|r| r.success).count() as u64;
        let cache_hits = inner.records.iter().filter(|r| r.cache_hit).count() as u64;
        let avg = if total == 0 {
            0.0
        } else {
            inner.records.iter().map(|r| r.processing_time_ms).sum::<f64>() / total as f64
        };
        Ok(LogStats::from_counts(total, successes, cache_hits, avg))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, success: bool, cache_hit: bool, ms: f64) -> AuditRecord {
        let mut record = AuditRecord::new(id, "worker-1", "hash", 4);
        record.success = success;
        record.cache_hit = cache_hit;
        record.processing_time_ms = ms;
        record
    }

    #[tokio::test]
    async fn rejects_duplicate_request_ids() {
        let store = MemoryLogStore::new();
        store.insert(&record("req-1", true, false, 1.0)).await.unwrap();

        let err = store.insert(&record("req-1", true, false, 1.0)).await.unwrap_err();
        assert_eq!(err.kind(), "duplicate");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn aggregates_stats() {
        let store = MemoryLogStore::new();
        store.insert(&record("a", true, true, 10.0)).await.unwrap();
        store.insert(&record("b", true, false, 20.0)).await.unwrap();
        store.insert(&record("c", false, false, 30.0)).await.unwrap();
        store.insert(&record("d", true, true, 40.0)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.success_count, 3);
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.cache_hit_rate, 0.5);
        assert_eq!(stats.avg_processing_time_ms, 25.0);
    }
}
