//! Catalog endpoints: create, update, search

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use spindle_common::db::Record;
use spindle_common::Error;

use super::{api_error, ApiError};
use crate::services::record_service::{RecordInput, RecordPage, SearchParams};
use crate::AppState;

/// POST /records
///
/// Create a new catalog record; enriches from MusicBrainz when the body
/// carries a release id.
pub async fn create_record(
    State(state): State<AppState>,
    Json(input): Json<RecordInput>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    match state.records.create(input).await {
        Ok(record) => Ok((StatusCode::CREATED, Json(record))),
        Err(e) => Err(map_catalog_error(e)),
    }
}

/// PUT /records/:id
///
/// Full-record replacement of an existing catalog record.
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<RecordInput>,
) -> Result<Json<Record>, ApiError> {
    match state.records.update(&id, input).await {
        Ok(record) => Ok(Json(record)),
        Err(e) => Err(map_catalog_error(e)),
    }
}

/// GET /records
///
/// Paged catalog search. Accepts either a free-text `q` or per-field
/// filters, plus `page`/`limit`.
pub async fn search_records(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<RecordPage>, ApiError> {
    match state.records.search(params).await {
        Ok(page) => Ok(Json(page)),
        Err(e) => Err(map_catalog_error(e)),
    }
}

fn map_catalog_error(e: Error) -> ApiError {
    match e {
        Error::InvalidInput(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        Error::NotFound(msg) => api_error(StatusCode::NOT_FOUND, msg),
        other => {
            tracing::error!(error = %other, "Catalog operation failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}
