//! Inference endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::{ServiceError, ValidationError};
use crate::http::request::{idempotency_key, request_id, ClientAddr, InferPayload};
use crate::http::response::Rejected;
use crate::http::server::AppState;
use crate::inference::InferenceRequest;

/// `POST /infer`
pub async fn infer(
    State(state): State<AppState>,
    ClientAddr(addr): ClientAddr,
    headers: HeaderMap,
    payload: Result<Json<InferPayload>, JsonRejection>,
) -> Response {
    let request_id = request_id(&headers);
    let worker_id = state.services.worker_id().to_string();

    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            return Rejected {
                error: ValidationError::new("body", rejection.body_text()),
                worker_id,
                request_id,
            }
            .into_response();
        }
    };

    if let Err(error) = payload.validate() {
        tracing::debug!(request_id = %request_id, error = %error, "Rejected inference request");
        return Rejected {
            error,
            worker_id,
            request_id,
        }
        .into_response();
    }

    let request = InferenceRequest {
        text: payload.text,
        idempotency_key: idempotency_key(&headers),
        request_id: request_id.clone(),
        client_addr: addr.map(|a| a.ip().to_string()),
    };

    // Detached so a client disconnect does not cancel the model call or its audit record.
    let orchestrator = state.services.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.handle(request).await });

    match task.await {
        Ok(Ok(outcome)) => Json(outcome.response).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(join_error) => {
            tracing::error!(request_id = %request_id, error = %join_error, "Inference task aborted");
            ServiceError::Internal {
                message: join_error.to_string(),
                request_id,
                worker_id,
            }
            .into_response()
        }
    }
}
