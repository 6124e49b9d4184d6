//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! InferenceRequest
//!     → IdempotencyStore.check (token given) ── hit ──→ replay stored response
//!     → CacheStore.get(hash)                 ── hit ──→ cached prediction
//!     → Classifier.predict (under deadline)
//!     → CacheStore.set (best-effort)
//!     → IdempotencyStore.store (token given, best-effort)
//!     → DurableLogger.log (best-effort)
//!     → InferenceResponse
//! ```
//!
//! # Design Decisions
//! - Only model failures fail a request; every store failure degrades silently
//! - Check-then-store on idempotency tokens is not atomic: two concurrent
//!   first requests with the same token may both run the model
//! - Replays return the stored response with `idempotency_hit` set

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::audit::{AuditRecord, DurableLogger, LogOutcome};
use crate::error::{truncate_message, ModelError, ServiceError, MAX_ERROR_MESSAGE_CHARS};
use crate::inference::hashing::{cache_key, normalize_text};
use crate::inference::model::{Classifier, Prediction};
use crate::observability::metrics::{self, ResponseSource};
use crate::resilience::timeouts::enforce;
use crate::storage::{CacheStore, IdempotencyStore};

/// One validated inference call.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub text: String,
    pub idempotency_key: Option<String>,
    pub request_id: String,
    pub client_addr: Option<String>,
}

/// Response body of `POST /infer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub prediction: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
    pub cache_hit: bool,
    pub worker_id: String,
    pub processing_time_ms: f64,
    #[serde(default)]
    pub idempotency_hit: bool,
}

/// Value stored in the response cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPrediction {
    pub prediction: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
}

impl From<Prediction> for CachedPrediction {
    fn from(p: Prediction) -> Self {
        Self {
            prediction: p.prediction,
            confidence: p.confidence,
            probabilities: p.probabilities,
        }
    }
}

/// A handled request and where its audit record went.
#[derive(Debug, Clone)]
pub struct InferenceOutcome {
    pub response: InferenceResponse,
    pub audit: LogOutcome,
}

pub struct RequestOrchestrator {
    classifier: Arc<dyn Classifier>,
    cache: CacheStore,
    idempotency: IdempotencyStore,
    logger: Arc<DurableLogger>,
    worker_id: String,
    inference_timeout: Duration,
}

impl RequestOrchestrator {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        cache: CacheStore,
        idempotency: IdempotencyStore,
        logger: Arc<DurableLogger>,
        worker_id: impl Into<String>,
        inference_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            cache,
            idempotency,
            logger,
            worker_id: worker_id.into(),
            inference_timeout,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    pub async fn handle(&self, request: InferenceRequest) -> Result<InferenceOutcome, ServiceError> {
        let start = Instant::now();
        let normalized = normalize_text(&request.text);
        let input_hash = cache_key(&request.text);

        if let Some(token) = request.idempotency_key.as_deref() {
            if let Some(response) = self.replay(token, &request.request_id).await {
                let mut record = self.record(&request, &input_hash);
                record.idempotency_hit = true;
                record.prediction = Some(response.prediction.clone());
                record.confidence = Some(response.confidence);
                record.probabilities = Some(response.probabilities.clone());
                record.processing_time_ms = elapsed_ms(start);

                let audit = self.logger.log(record).await;
                metrics::record_request("success", ResponseSource::Idempotency, start);
                tracing::info!(
                    request_id = %request.request_id,
                    "Returning stored response for idempotency key"
                );
                return Ok(InferenceOutcome { response, audit });
            }
        }

        let (prediction, cache_hit, inference_time_ms) = match self.cached(&input_hash, &request.request_id).await {
            Some(cached) => (cached, true, None),
            None => {
                let infer_start = Instant::now();
                match self.predict(&normalized).await {
                    Ok(prediction) => {
                        let inference_time = infer_start.elapsed();
                        metrics::record_inference_duration(inference_time);

                        let cached = CachedPrediction::from(prediction);
                        if let Ok(payload) = serde_json::to_string(&cached) {
                            self.cache.set(&input_hash, &payload).await;
                        }
                        (cached, false, Some(inference_time.as_secs_f64() * 1000.0))
                    }
                    Err(e) => return Err(self.fail(&request, &input_hash, start, e).await),
                }
            }
        };

        let response = InferenceResponse {
            prediction: prediction.prediction,
            confidence: prediction.confidence,
            probabilities: prediction.probabilities,
            cache_hit,
            worker_id: self.worker_id.clone(),
            processing_time_ms: elapsed_ms(start),
            idempotency_hit: false,
        };

        if let Some(token) = request.idempotency_key.as_deref() {
            match serde_json::to_string(&response) {
                Ok(payload) => {
                    self.idempotency.store(token, &payload).await;
                }
                Err(e) => tracing::warn!(error = %e, "Failed to serialize response for idempotency store"),
            }
        }

        let mut record = self.record(&request, &input_hash);
        record.cache_hit = cache_hit;
        record.prediction = Some(response.prediction.clone());
        record.confidence = Some(response.confidence);
        record.probabilities = Some(response.probabilities.clone());
        record.processing_time_ms = response.processing_time_ms;
        record.inference_time_ms = inference_time_ms;
        let audit = self.logger.log(record).await;

        metrics::record_request("success", ResponseSource::from_cache_hit(cache_hit), start);
        tracing::info!(
            request_id = %request.request_id,
            prediction = %response.prediction,
            confidence = response.confidence,
            cache_hit = cache_hit,
            processing_time_ms = response.processing_time_ms,
            "Inference completed"
        );

        Ok(InferenceOutcome { response, audit })
    }

    async fn replay(&self, token: &str, request_id: &str) -> Option<InferenceResponse> {
        let stored = self.idempotency.check(token).await?;
        match serde_json::from_str::<InferenceResponse>(&stored) {
            Ok(mut response) => {
                response.idempotency_hit = true;
                Some(response)
            }
            Err(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Undecodable idempotency record, ignoring");
                None
            }
        }
    }

    async fn cached(&self, input_hash: &str, request_id: &str) -> Option<CachedPrediction> {
        let stored = self.cache.get(input_hash).await?;
        match serde_json::from_str(&stored) {
            Ok(cached) => Some(cached),
            Err(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Undecodable cache entry, ignoring");
                None
            }
        }
    }

    async fn predict(&self, normalized: &str) -> Result<Prediction, ModelError> {
        if !self.classifier.is_ready() {
            return Err(ModelError::NotLoaded);
        }
        match enforce(self.inference_timeout, self.classifier.predict(normalized)).await {
            Some(result) => result,
            None => Err(ModelError::Timeout(self.inference_timeout.as_millis() as u64)),
        }
    }

    async fn fail(
        &self,
        request: &InferenceRequest,
        input_hash: &str,
        start: Instant,
        error: ModelError,
    ) -> ServiceError {
        let kind = error.kind();
        let message = truncate_message(&error.to_string(), MAX_ERROR_MESSAGE_CHARS);

        tracing::error!(
            request_id = %request.request_id,
            error_type = kind,
            error = %message,
            "Inference failed"
        );

        let mut record = self.record(request, input_hash).with_error(kind, &message);
        record.processing_time_ms = elapsed_ms(start);
        self.logger.log(record).await;

        metrics::record_error(kind);
        metrics::record_request("error", ResponseSource::Model, start);

        ServiceError::Inference {
            kind,
            message,
            request_id: request.request_id.clone(),
            worker_id: self.worker_id.clone(),
        }
    }

    fn record(&self, request: &InferenceRequest, input_hash: &str) -> AuditRecord {
        let mut record = AuditRecord::new(
            request.request_id.clone(),
            self.worker_id.clone(),
            input_hash,
            request.text.chars().count(),
        );
        record.idempotency_key = request.idempotency_key.clone();
        record.client_addr = request.client_addr.clone();
        record
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
