//! spindle-api library - record catalog and ordering service

use axum::routing::{post, put};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod pagination;
pub mod services;
pub mod utils;

use services::{MusicBrainzClient, OrderService, RecordService};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Catalog operations
    pub records: RecordService,
    /// Order placement coordinator
    pub orders: OrderService,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, mb: Arc<MusicBrainzClient>) -> Self {
        Self {
            records: RecordService::new(db.clone(), mb),
            orders: OrderService::new(db),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/records",
            post(api::records::create_record).get(api::records::search_records),
        )
        .route("/records/:id", put(api::records::update_record))
        .route("/orders", post(api::orders::create_order))
        .merge(api::health::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
