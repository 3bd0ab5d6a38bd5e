//! Service layer: catalog, order placement, metadata enrichment

pub mod musicbrainz_client;
pub mod order_service;
pub mod record_service;

pub use musicbrainz_client::MusicBrainzClient;
pub use order_service::OrderService;
pub use record_service::RecordService;

use spindle_common::db::{Record, RecordRow};
use spindle_common::{Error, Result};
use sqlx::SqlitePool;

/// Point lookup of a record by GUID
pub(crate) async fn fetch_record(db: &SqlitePool, guid: &str) -> Result<Record> {
    let row: Option<RecordRow> = sqlx::query_as(
        "SELECT guid, artist, album, price, qty, format, category, mbid, track_list, created_at, updated_at
         FROM records WHERE guid = ?",
    )
    .bind(guid)
    .fetch_optional(db)
    .await?;

    match row {
        Some(row) => Record::try_from(row),
        None => Err(Error::NotFound(format!("Record not found: {}", guid))),
    }
}
