//! Request parsing and validation.
//!
//! # Responsibilities
//! - Deserialize and validate the `POST /infer` body
//! - Extract request id, idempotency key, and client address
//!
//! # Design Decisions
//! - Request ID is assigned by `SetRequestIdLayer` before any handler runs
//! - Client address is optional so routers work without `ConnectInfo` (tests)

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde::Deserialize;

use crate::error::ValidationError;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_IDEMPOTENCY_KEY: &str = "x-idempotency-key";

/// Maximum accepted input length, in characters.
pub const MAX_TEXT_CHARS: usize = 10_000;

/// Body of `POST /infer`.
#[derive(Debug, Clone, Deserialize)]
pub struct InferPayload {
    pub text: String,
}

impl InferPayload {
    /// 1..=10,000 characters and not blank after trimming.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let chars = self.text.chars().count();
        if chars == 0 {
            return Err(ValidationError::new("text", "ensure this value has at least 1 characters"));
        }
        if chars > MAX_TEXT_CHARS {
            return Err(ValidationError::new(
                "text",
                format!("ensure this value has at most {} characters", MAX_TEXT_CHARS),
            ));
        }
        if self.text.trim().is_empty() {
            return Err(ValidationError::new("text", "Text cannot be empty"));
        }
        Ok(())
    }
}

/// Request id set by the request-id layer, or a fresh one if absent.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Non-empty `X-Idempotency-Key` header value.
pub fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_IDEMPOTENCY_KEY)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Peer address when the server was started with connect info.
#[derive(Debug, Clone, Copy)]
pub struct ClientAddr(pub Option<SocketAddr>);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn payload(text: &str) -> InferPayload {
        InferPayload { text: text.into() }
    }

    #[test]
    fn validates_length_and_blankness() {
        assert!(payload("ok").validate().is_ok());
        assert!(payload("").validate().is_err());
        assert!(payload("   \n").validate().is_err());
        assert!(payload(&"a".repeat(MAX_TEXT_CHARS)).validate().is_ok());
        assert!(payload(&"a".repeat(MAX_TEXT_CHARS + 1)).validate().is_err());
        // Counted in characters, not bytes.
        assert!(payload(&"é".repeat(MAX_TEXT_CHARS)).validate().is_ok());
    }

    #[test]
    fn reads_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers), None);
        assert_eq!(request_id(&headers).len(), 36);

        headers.insert(X_IDEMPOTENCY_KEY, HeaderValue::from_static("  tok-1 "));
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("req-9"));
        assert_eq!(idempotency_key(&headers).as_deref(), Some("tok-1"));
        assert_eq!(request_id(&headers), "req-9");
    }
}
