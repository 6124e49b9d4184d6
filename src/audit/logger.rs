//! Durable request logging with a local fallback.
//!
//! # Responsibilities
//! - Write one `AuditRecord` per request through breaker → retry → timeout
//! - Buffer records the store could not take, in arrival order
//! - Replay the buffer on demand, periodically, and at shutdown
//!
//! # Design Decisions
//! - `log` never fails and never blocks on a dead store: it persists or buffers
//! - `flush` writes directly (no breaker, no retry); failures go back to the front
//! - A duplicate request id means the row already exists and is not re-buffered

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::audit::buffer::{BufferSnapshot, FallbackBuffer};
use crate::audit::record::AuditRecord;
use crate::error::StoreError;
use crate::observability::metrics;
use crate::resilience::timeouts::with_store_timeout;
use crate::resilience::{CircuitBreaker, RetryExecutor};
use crate::storage::{LogStats, LogStore};

const DEPENDENCY: &str = "log_store";

/// Where a logged record ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutcome {
    Persisted,
    Buffered,
}

/// Resilient writer in front of the `LogStore`.
pub struct DurableLogger {
    store: Arc<dyn LogStore>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    timeout: Duration,
    buffer: FallbackBuffer<AuditRecord>,
}

impl DurableLogger {
    pub fn new(
        store: Arc<dyn LogStore>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryExecutor,
        timeout: Duration,
        buffer_capacity: usize,
    ) -> Self {
        Self {
            store,
            breaker,
            retry,
            timeout,
            buffer: FallbackBuffer::new(buffer_capacity),
        }
    }

    /// Persist `record`, or buffer it if the store is unavailable.
    pub async fn log(&self, record: AuditRecord) -> LogOutcome {
        let store = self.store.as_ref();
        let timeout = self.timeout;
        let rec = &record;

        let result = self
            .breaker
            .call_with_fallback(
                async {
                    self.retry
                        .run("log_store_insert", move || {
                            with_store_timeout(DEPENDENCY, timeout, insert_once(store, rec))
                        })
                        .await
                        .map(|_| LogOutcome::Persisted)
                },
                || async {
                    tracing::warn!(request_id = %rec.request_id, "Log store circuit open, buffering log entry");
                    self.enqueue(rec.clone())
                },
            )
            .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    request_id = %record.request_id,
                    error = %e,
                    "Log write failed, buffering log entry"
                );
                self.enqueue(record)
            }
        }
    }

    /// Replay buffered records in order. Returns how many were persisted.
    pub async fn flush(&self) -> usize {
        let drained = self.buffer.drain();
        if drained.is_empty() {
            self.buffer.restore_front(Vec::new());
            return 0;
        }

        let pending = drained.len();
        tracing::info!(pending = pending, "Flushing buffered logs");

        let mut flushed = 0;
        let mut failed = Vec::new();
        for record in drained {
            let result =
                with_store_timeout(DEPENDENCY, self.timeout, self.store.insert(&record)).await;
            match result {
                Ok(()) => flushed += 1,
                Err(StoreError::Duplicate { key, .. }) => {
                    tracing::warn!(request_id = %key, "Buffered log already persisted, skipping");
                }
                Err(e) => {
                    tracing::error!(request_id = %record.request_id, error = %e, "Failed to flush log");
                    failed.push(record);
                }
            }
        }

        let failed_count = failed.len();
        let dropped = self.buffer.restore_front(failed);
        for _ in 0..dropped {
            metrics::record_log_dropped();
        }

        tracing::info!(
            flushed = flushed,
            failed = failed_count,
            dropped = dropped,
            remaining = self.buffer.len(),
            "Log buffer flush finished"
        );
        flushed
    }

    /// Aggregate statistics from the store.
    pub async fn stats(&self) -> Result<LogStats, StoreError> {
        with_store_timeout(DEPENDENCY, self.timeout, self.store.stats()).await
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

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn buffer(&self) -> BufferSnapshot {
        self.buffer.snapshot()
    }

    /// Flush every `interval` until shutdown is signalled.
    pub async fn run_flusher(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        if interval.is_zero() {
            tracing::info!("Background log flusher disabled");
            return;
        }

        tracing::info!(interval_secs = interval.as_secs(), "Background log flusher starting");
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.buffer.is_empty() {
                        self.flush().await;
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Log flusher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn enqueue(&self, record: AuditRecord) -> LogOutcome {
        metrics::record_fallback(DEPENDENCY, "buffer_log");
        if self.buffer.push(record) {
            metrics::record_log_dropped();
            tracing::error!(capacity = self.buffer.capacity(), "Log buffer full, dropped oldest entry");
        }
        LogOutcome::Buffered
    }
}

/// One insert; an existing row for the same request id counts as written.
async fn insert_once(store: &dyn LogStore, record: &AuditRecord) -> Result<(), StoreError> {
    match store.insert(record).await {
        Err(StoreError::Duplicate { key, .. }) => {
            tracing::warn!(request_id = %key, "Log entry already persisted");
            Ok(())
        }
        other => other,
    }
}
