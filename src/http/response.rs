//! Error responses.
//!
//! # Responsibilities
//! - Map `ServiceError` to 500 with the JSON error envelope
//! - Map rejected input to 422

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ValidationError};

/// JSON body of every non-2xx response from the inference API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub worker_id: String,
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            error_type: self.kind().to_string(),
            worker_id: self.worker_id().to_string(),
            request_id: Some(self.request_id().to_string()),
            timestamp: Utc::now(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Input rejected before orchestration.
#[derive(Debug)]
pub struct Rejected {
    pub error: ValidationError,
    pub worker_id: String,
    pub request_id: String,
}

impl IntoResponse for Rejected {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.error.to_string(),
            error_type: "ValidationError".to_string(),
            worker_id: self.worker_id,
            request_id: Some(self.request_id),
            timestamp: Utc::now(),
        };
        (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
    }
}
