// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from `GateError` to HTTP responses.
//!
//! Every variant has a stable status code. `Storage` and `Internal` details
//! are logged and replaced with a generic message so backend internals never
//! leak to callers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use wagate_core::GateError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Newtype adapter so handlers can return `Result<_, ApiError>` with `?`.
pub struct ApiError(pub GateError);

impl From<GateError> for ApiError {
    fn from(error: GateError) -> Self {
        ApiError(error)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            GateError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message.clone()),
            GateError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            GateError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string()),
            GateError::NotReady => (
                StatusCode::CONFLICT,
                "session not authenticated".to_string(),
            ),
            GateError::RateLimited { retry_after_secs } => {
                let body = Json(ErrorResponse {
                    error: "too many failed attempts".to_string(),
                });
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("retry-after", retry_after_secs.to_string())],
                    body,
                )
                    .into_response();
            }
            GateError::Conflict => (StatusCode::CONFLICT, "conflict".to_string()),
            GateError::InvalidState => (
                StatusCode::CONFLICT,
                "operation not valid in current state".to_string(),
            ),
            GateError::Client { message, .. } => (StatusCode::BAD_GATEWAY, message.clone()),
            GateError::Storage { source } => {
                tracing::error!(error = %source, "storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            GateError::Internal(message) => {
                tracing::error!(error = %message, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_are_stable() {
        let cases = [
            (GateError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (GateError::NotFound, StatusCode::NOT_FOUND),
            (GateError::Forbidden, StatusCode::FORBIDDEN),
            (GateError::NotReady, StatusCode::CONFLICT),
            (GateError::Conflict, StatusCode::CONFLICT),
            (GateError::InvalidState, StatusCode::CONFLICT),
            (GateError::client("x"), StatusCode::BAD_GATEWAY),
            (
                GateError::Internal("secret detail".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError(error).into_response().status(), expected);
        }
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ApiError(GateError::RateLimited {
            retry_after_secs: 120,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get("retry-after").unwrap(),
            "120"
        );
    }
}
