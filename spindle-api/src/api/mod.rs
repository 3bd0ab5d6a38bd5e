//! HTTP API handlers

pub mod health;
pub mod orders;
pub mod records;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

/// JSON error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error type: status code plus JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}
