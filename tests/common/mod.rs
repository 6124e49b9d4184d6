//! Shared fixtures for integration tests: fault-injectable stores and a
//! call-counting classifier.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use inference_server::audit::AuditRecord;
use inference_server::config::ServerConfig;
use inference_server::error::{ModelError, StoreError};
use inference_server::inference::{Classifier, LinearTextModel, Prediction};
use inference_server::storage::{KeyValueStore, LogStats, LogStore, MemoryKvStore, MemoryLogStore};
use inference_server::Services;

/// In-memory key-value store that can be switched off.
#[derive(Default)]
pub struct FlakyKvStore {
    pub inner: MemoryKvStore,
    pub down: AtomicBool,
    pub calls: AtomicUsize,
}

impl FlakyKvStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("kv", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, ttl_secs: u64, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set_ex(key, ttl_secs, value).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}

/// In-memory log store that can be switched off.
#[derive(Default)]
pub struct FlakyLogStore {
    pub inner: MemoryLogStore,
    pub down: AtomicBool,
}

impl FlakyLogStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn request_ids(&self) -> Vec<String> {
        self.inner.records().into_iter().map(|r| r.request_id).collect()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("log_store", "database is locked"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LogStore for FlakyLogStore {
    async fn insert(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.insert(record).await
    }

    async fn stats(&self) -> Result<LogStats, StoreError> {
        self.check()?;
        self.inner.stats().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}

/// Built-in model that counts invocations and can be made to fail.
pub struct CountingClassifier {
    model: LinearTextModel,
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
}

impl CountingClassifier {
    pub fn new() -> Self {
        Self {
            model: LinearTextModel::builtin(),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for CountingClassifier {
    async fn predict(&self, text: &str) -> Result<Prediction, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ModelError::Inference("CUDA out of memory".into()));
        }
        self.model.predict(text).await
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Config with fast retries and no background flusher.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.model.path = None;
    config.server.worker_id = "worker-test".into();
    config.retries.base_delay_ms = 1;
    config.retries.max_delay_ms = 5;
    config.fallback_buffer.flush_interval_secs = 0;
    config.observability.metrics_enabled = false;
    config
}

pub struct Harness {
    pub services: Arc<Services>,
    pub kv: Arc<FlakyKvStore>,
    pub logs: Arc<FlakyLogStore>,
    pub classifier: Arc<CountingClassifier>,
}

pub fn harness(config: ServerConfig) -> Harness {
    let kv = Arc::new(FlakyKvStore::default());
    let logs = Arc::new(FlakyLogStore::default());
    let classifier = Arc::new(CountingClassifier::new());

    let services = Arc::new(Services::with_components(
        config,
        kv.clone(),
        logs.clone(),
        classifier.clone(),
    ));

    Harness {
        services,
        kv,
        logs,
        classifier,
    }
}
