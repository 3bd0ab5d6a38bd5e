//! Catalog operations: create, update, search
//!
//! Enrichment is best-effort: a failed or empty MusicBrainz lookup is logged
//! and the catalog write proceeds without track data. Track lists are only
//! ever replaced wholesale, as the outcome of a successful lookup.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use spindle_common::db::{Record, RecordCategory, RecordFormat, RecordRow, Track};
use spindle_common::{Error, Result};

use super::musicbrainz_client::MusicBrainzClient;
use crate::pagination::{calculate_pagination, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Attributes accepted by catalog create and update (full replacement)
#[derive(Debug, Clone, Deserialize)]
pub struct RecordInput {
    pub artist: String,
    pub album: String,
    pub price: f64,
    pub qty: i64,
    pub format: RecordFormat,
    pub category: RecordCategory,
    /// MusicBrainz release id to enrich from (optional)
    pub mbid: Option<String>,
}

/// Search filters; `q` takes precedence over the per-field filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    /// Free-text query matched against artist, album, and category
    pub q: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub format: Option<RecordFormat>,
    pub category: Option<RecordCategory>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// One page of search results
#[derive(Debug, Serialize)]
pub struct RecordPage {
    pub total_results: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub records: Vec<Record>,
}

/// Track list retrieved for a release
struct ReleaseData {
    mbid: String,
    tracks: Vec<Track>,
}

/// Catalog service
#[derive(Clone)]
pub struct RecordService {
    db: SqlitePool,
    mb: Arc<MusicBrainzClient>,
}

impl RecordService {
    pub fn new(db: SqlitePool, mb: Arc<MusicBrainzClient>) -> Self {
        Self { db, mb }
    }

    /// Point lookup by GUID
    pub async fn get(&self, guid: &str) -> Result<Record> {
        super::fetch_record(&self.db, guid).await
    }

    /// Create a catalog record, enriching from MusicBrainz when a release id
    /// is supplied.
    pub async fn create(&self, input: RecordInput) -> Result<Record> {
        validate(&input)?;

        let release = match &input.mbid {
            Some(mbid) => self.retrieve_release(mbid).await,
            None => None,
        };
        let (mbid, track_json) = release_columns(release)?;

        let guid = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO records (guid, artist, album, price, qty, format, category, mbid, track_list)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&guid)
        .bind(input.artist.trim())
        .bind(input.album.trim())
        .bind(input.price)
        .bind(input.qty)
        .bind(input.format.as_str())
        .bind(input.category.as_str())
        .bind(&mbid)
        .bind(&track_json)
        .execute(&self.db)
        .await?;

        tracing::info!(record = %guid, artist = %input.artist, album = %input.album, "Record created");

        super::fetch_record(&self.db, &guid).await
    }

    /// Full-record replacement by GUID.
    ///
    /// Enrichment re-runs only when the supplied release id differs from the
    /// stored one; otherwise the stored mbid and track list carry over.
    pub async fn update(&self, guid: &str, input: RecordInput) -> Result<Record> {
        validate(&input)?;

        let existing = super::fetch_record(&self.db, guid).await?;

        let (mbid, track_json) = match &input.mbid {
            Some(new_mbid) if existing.mbid.as_deref() != Some(new_mbid.as_str()) => {
                release_columns(self.retrieve_release(new_mbid).await)?
            }
            _ => {
                // Release id absent or unchanged: keep what we have
                let track_json = existing
                    .track_list
                    .as_ref()
                    .map(|t| serde_json::to_string(t))
                    .transpose()
                    .map_err(|e| Error::Internal(format!("Failed to encode track list: {}", e)))?;
                (existing.mbid.clone(), track_json)
            }
        };

        let result = sqlx::query(
            "UPDATE records
             SET artist = ?, album = ?, price = ?, qty = ?, format = ?, category = ?,
                 mbid = ?, track_list = ?, updated_at = CURRENT_TIMESTAMP
             WHERE guid = ?",
        )
        .bind(input.artist.trim())
        .bind(input.album.trim())
        .bind(input.price)
        .bind(input.qty)
        .bind(input.format.as_str())
        .bind(input.category.as_str())
        .bind(&mbid)
        .bind(&track_json)
        .bind(guid)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            // The record was read moments ago; losing it here is a store fault
            return Err(Error::Internal(format!("Failed to update record: {}", guid)));
        }

        tracing::info!(record = %guid, "Record updated");

        super::fetch_record(&self.db, guid).await
    }

    /// Paged catalog search.
    ///
    /// Free-text `q` matches artist OR album OR category (case-insensitive
    /// substring) and wins over the per-field filters. Per-field mode matches
    /// artist/album as substrings and format/category exactly.
    pub async fn search(&self, params: SearchParams) -> Result<RecordPage> {
        let page_size = params
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let requested_page = params.page.unwrap_or(1);

        let mut clauses: Vec<&str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        let q = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
        if let Some(q) = q {
            clauses.push(
                "(artist LIKE ? ESCAPE '\\' OR album LIKE ? ESCAPE '\\' OR category LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(q);
            binds.push(pattern.clone());
            binds.push(pattern.clone());
            binds.push(pattern);
        } else {
            if let Some(artist) = params.artist.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                clauses.push("artist LIKE ? ESCAPE '\\'");
                binds.push(like_pattern(artist));
            }
            if let Some(album) = params.album.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                clauses.push("album LIKE ? ESCAPE '\\'");
                binds.push(like_pattern(album));
            }
            if let Some(format) = params.format {
                clauses.push("format = ?");
                binds.push(format.as_str().to_string());
            }
            if let Some(category) = params.category {
                clauses.push("category = ?");
                binds.push(category.as_str().to_string());
            }
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        // Get total count
        let count_sql = format!("SELECT COUNT(*) FROM records{}", where_sql);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total_results = count_query.fetch_one(&self.db).await?;

        let pagination = calculate_pagination(total_results, requested_page, page_size);

        // Query the requested window
        let page_sql = format!(
            "SELECT guid, artist, album, price, qty, format, category, mbid, track_list, created_at, updated_at
             FROM records{}
             ORDER BY created_at DESC, guid
             LIMIT ? OFFSET ?",
            where_sql
        );
        let mut page_query = sqlx::query_as::<_, RecordRow>(&page_sql);
        for bind in &binds {
            page_query = page_query.bind(bind);
        }
        let rows = page_query
            .bind(page_size)
            .bind(pagination.offset)
            .fetch_all(&self.db)
            .await?;

        let records = rows
            .into_iter()
            .map(Record::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(RecordPage {
            total_results,
            page: pagination.page,
            page_size,
            total_pages: pagination.total_pages,
            records,
        })
    }

    /// Best-effort release lookup; any failure is logged and swallowed
    async fn retrieve_release(&self, mbid: &str) -> Option<ReleaseData> {
        match self.mb.lookup_release(mbid).await {
            Ok(release) => {
                let tracks: Vec<Track> = release
                    .media
                    .first()
                    .map(|medium| {
                        medium
                            .tracks
                            .iter()
                            .map(|track| Track {
                                title: track.title.clone(),
                                track_mbid: track.id.clone(),
                                recording_mbid: track.recording.id.clone(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Some(ReleaseData {
                    mbid: release.id,
                    tracks,
                })
            }
            Err(e) => {
                tracing::warn!(
                    mbid = %mbid,
                    error = %e,
                    "Release lookup failed, continuing without enrichment"
                );
                None
            }
        }
    }
}

/// Map a lookup outcome onto the (mbid, track_list) column pair.
/// Only a successful lookup persists a release id.
fn release_columns(release: Option<ReleaseData>) -> Result<(Option<String>, Option<String>)> {
    match release {
        Some(data) => {
            let track_json = if data.tracks.is_empty() {
                None
            } else {
                Some(
                    serde_json::to_string(&data.tracks)
                        .map_err(|e| Error::Internal(format!("Failed to encode track list: {}", e)))?,
                )
            };
            Ok((Some(data.mbid), track_json))
        }
        None => Ok((None, None)),
    }
}

fn validate(input: &RecordInput) -> Result<()> {
    if input.artist.trim().is_empty() {
        return Err(Error::InvalidInput("Artist must not be empty".to_string()));
    }
    if input.album.trim().is_empty() {
        return Err(Error::InvalidInput("Album must not be empty".to_string()));
    }
    if !input.price.is_finite() || input.price < 0.0 {
        return Err(Error::InvalidInput(format!(
            "Price must be non-negative, got {}",
            input.price
        )));
    }
    if input.qty < 0 {
        return Err(Error::InvalidInput(format!(
            "Quantity must be non-negative, got {}",
            input.qty
        )));
    }
    Ok(())
}

/// Escape LIKE wildcards and wrap the term for substring matching
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
