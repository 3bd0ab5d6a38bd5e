//! Order placement endpoint

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use spindle_common::Error;

use super::{api_error, ApiError};
use crate::services::order_service::PlacedOrder;
use crate::AppState;

/// POST /orders request body
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// GUID of the record to order
    pub record_id: String,
    /// Units requested
    pub qty: i64,
}

/// POST /orders
///
/// Place an order against a record's stock. Unknown record, insufficient
/// stock, and malformed input all surface as 400; the caller sees either a
/// fully committed order or no state change at all.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>), ApiError> {
    match state.orders.place(&request.record_id, request.qty).await {
        Ok(placed) => Ok((StatusCode::CREATED, Json(placed))),
        Err(e) => Err(map_order_error(e)),
    }
}

fn map_order_error(e: Error) -> ApiError {
    match e {
        Error::InvalidInput(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        Error::NotFound(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        err @ Error::InsufficientStock { .. } => api_error(StatusCode::BAD_REQUEST, err.to_string()),
        other => {
            tracing::error!(error = %other, "Order placement failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}
