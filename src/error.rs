//! Error taxonomy shared across the service.
//!
//! # Propagation
//! ```text
//! StoreError      → absorbed by the cache / idempotency / audit adapters
//! CircuitOpen     → only seen by callers that wrap a dependency without a fallback
//! ModelError      → fatal to the request, surfaces as ServiceError::Inference
//! ValidationError → rejected at the HTTP edge before orchestration
//! ```

use thiserror::Error;

use crate::resilience::retries::Retryable;

/// Maximum length of an error message carried in audit records and responses.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Failure talking to an external store (key-value or log store).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Connection refused, dropped, or otherwise unreachable.
    #[error("{dependency} unavailable: {message}")]
    Unavailable {
        dependency: &'static str,
        message: String,
    },

    /// The operation exceeded its deadline.
    #[error("{dependency} operation timed out after {elapsed_ms}ms")]
    Timeout {
        dependency: &'static str,
        elapsed_ms: u64,
    },

    /// The record already exists (unique key violation).
    #[error("{dependency} rejected duplicate key: {key}")]
    Duplicate {
        dependency: &'static str,
        key: String,
    },

    /// Any other store-side failure that retrying will not fix.
    #[error("{dependency} error: {message}")]
    Backend {
        dependency: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn unavailable(dependency: &'static str, message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            dependency,
            message: message.into(),
        }
    }

    pub fn backend(dependency: &'static str, message: impl Into<String>) -> Self {
        StoreError::Backend {
            dependency,
            message: message.into(),
        }
    }

    /// Short, stable name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Unavailable { .. } => "unavailable",
            StoreError::Timeout { .. } => "timeout",
            StoreError::Duplicate { .. } => "duplicate",
            StoreError::Backend { .. } => "backend",
        }
    }
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable { .. } | StoreError::Timeout { .. }
        )
    }
}

/// Raised by a circuit breaker that short-circuits without a fallback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("circuit breaker open for {dependency}")]
pub struct CircuitOpenError {
    pub dependency: String,
}

impl From<CircuitOpenError> for StoreError {
    fn from(err: CircuitOpenError) -> Self {
        StoreError::Unavailable {
            dependency: "circuit_breaker",
            message: err.to_string(),
        }
    }
}

/// Failure of the classification model collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("model not loaded")]
    NotLoaded,

    #[error("invalid model definition: {0}")]
    InvalidModel(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("inference timed out after {0}ms")]
    Timeout(u64),
}

impl ModelError {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::NotLoaded => "ModelNotLoaded",
            ModelError::InvalidModel(_) => "InvalidModel",
            ModelError::Inference(_) => "ModelInferenceError",
            ModelError::Timeout(_) => "InferenceTimeout",
        }
    }
}

/// Bad request input, rejected before reaching the orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Request-level failure returned by the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The model failed; the request cannot be answered.
    #[error("{message}")]
    Inference {
        kind: &'static str,
        message: String,
        request_id: String,
        worker_id: String,
    },

    /// The request task died before producing a response.
    #[error("request processing aborted: {message}")]
    Internal {
        message: String,
        request_id: String,
        worker_id: String,
    },
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Inference { kind, .. } => *kind,
            ServiceError::Internal { .. } => "InternalError",
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            ServiceError::Inference { request_id, .. } | ServiceError::Internal { request_id, .. } => {
                request_id
            }
        }
    }

    pub fn worker_id(&self) -> &str {
        match self {
            ServiceError::Inference { worker_id, .. } | ServiceError::Internal { worker_id, .. } => {
                worker_id
            }
        }
    }
}

/// Truncate a message to at most `max_chars` characters on a char boundary.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_retryability() {
        assert!(StoreError::unavailable("kv", "refused").is_retryable());
        assert!(StoreError::Timeout {
            dependency: "kv",
            elapsed_ms: 10
        }
        .is_retryable());
        assert!(!StoreError::backend("kv", "WRONGTYPE").is_retryable());
        assert!(!StoreError::Duplicate {
            dependency: "log_store",
            key: "req-1".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::Timeout {
            dependency: "log_store",
            elapsed_ms: 5000,
        };
        assert_eq!(err.to_string(), "log_store operation timed out after 5000ms");

        let err = CircuitOpenError {
            dependency: "kv".into(),
        };
        assert_eq!(err.to_string(), "circuit breaker open for kv");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_message("héllo", 2), "hé");
        assert_eq!(truncate_message("short", 500), "short");
        let long = "x".repeat(600);
        assert_eq!(truncate_message(&long, MAX_ERROR_MESSAGE_CHARS).len(), 500);
    }
}
