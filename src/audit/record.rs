//! Audit record written for every handled request.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{truncate_message, MAX_ERROR_MESSAGE_CHARS};

/// One row of the durable request log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: String,
    pub worker_id: String,

    /// SHA-256 cache key of the normalized input.
    pub input_hash: String,
    /// Character count of the raw input.
    pub input_length: usize,

    pub prediction: Option<String>,
    pub confidence: Option<f64>,
    pub probabilities: Option<BTreeMap<String, f64>>,

    pub cache_hit: bool,
    pub idempotency_hit: bool,
    pub success: bool,

    pub processing_time_ms: f64,
    pub inference_time_ms: Option<f64>,

    pub error_kind: Option<String>,
    /// At most 500 characters.
    pub error_message: Option<String>,

    pub idempotency_key: Option<String>,
    pub client_addr: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// A successful record with no prediction attached yet.
    pub fn new(
        request_id: impl Into<String>,
        worker_id: impl Into<String>,
        input_hash: impl Into<String>,
        input_length: usize,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            worker_id: worker_id.into(),
            input_hash: input_hash.into(),
            input_length,
            prediction: None,
            confidence: None,
            probabilities: None,
            cache_hit: false,
            idempotency_hit: false,
            success: true,
            processing_time_ms: 0.0,
            inference_time_ms: None,
            error_kind: None,
            error_message: None,
            idempotency_key: None,
            client_addr: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the record failed, truncating the message.
    pub fn with_error(mut self, kind: impl Into<String>, message: &str) -> Self {
        self.success = false;
        self.error_kind = Some(kind.into());
        self.error_message = Some(truncate_message(message, MAX_ERROR_MESSAGE_CHARS));
        self
    }
}
