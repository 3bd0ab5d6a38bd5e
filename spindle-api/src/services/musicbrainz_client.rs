//! MusicBrainz API client
//!
//! Release lookup with rate limiting. Only the fields the catalog consumes
//! are decoded; the rest of the upstream response shape is ignored.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const USER_AGENT: &str = "Spindle/0.1.0 (https://github.com/spindle/spindle)";
// MusicBrainz API rule: 1 request per second per User-Agent
const RATE_LIMIT_MS: u64 = 1000;

/// MusicBrainz client errors
#[derive(Debug, Error)]
pub enum MBError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Release not found: {0}")]
    ReleaseNotFound(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// MusicBrainz Release response (narrow view)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBRelease {
    /// Release MBID (MusicBrainz ID)
    pub id: String,
    /// Release title
    pub title: String,
    /// Physical media making up the release, each with its track list
    #[serde(default)]
    pub media: Vec<MBMedia>,
}

/// One medium (disc, LP side set, ...) of a release
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBMedia {
    /// Tracks on this medium
    #[serde(default)]
    pub tracks: Vec<MBTrack>,
}

/// MusicBrainz track: the relationship between a release and a recording
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBTrack {
    /// Track MBID (release-to-recording relationship id)
    pub id: String,
    /// Track title
    pub title: String,
    /// The recording this track presents
    pub recording: MBRecordingRef,
}

/// Recording reference embedded in a track
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBRecordingRef {
    /// Recording MBID (MusicBrainz ID)
    pub id: String,
    /// Recording title
    pub title: String,
}

/// Rate limiter enforcing 1 request/second
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl MusicBrainzClient {
    /// Create a client against the given API base URL
    /// (e.g. `https://musicbrainz.org/ws/2`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, MBError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            base_url: base_url.into(),
        })
    }

    /// Lookup a release by MBID, including its recordings
    pub async fn lookup_release(&self, mbid: &str) -> Result<MBRelease, MBError> {
        // Rate limit
        self.rate_limiter.wait().await;

        let url = format!(
            "{}/release/{}?inc=recordings&fmt=json",
            self.base_url, mbid
        );

        tracing::debug!(mbid = %mbid, url = %url, "Querying MusicBrainz API");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 404 {
            return Err(MBError::ReleaseNotFound(mbid.to_string()));
        }

        if status == 503 {
            return Err(MBError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MBError::ApiError(status.as_u16(), error_text));
        }

        let release: MBRelease = response
            .json()
            .await
            .map_err(|e| MBError::ParseError(e.to_string()))?;

        tracing::info!(
            mbid = %mbid,
            title = %release.title,
            track_count = release.media.first().map(|m| m.tracks.len()).unwrap_or(0),
            "Retrieved release from MusicBrainz"
        );

        Ok(release)
    }
}
