//! Turns a public track URL into a playable stream URL.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info};
use url::Url;

use crate::catalog::CatalogEntry;
use crate::error::UpstreamError;
use crate::response::StreamFailureResponse;
use crate::upstream::SoundCloudClient;
use crate::validation::{validate_soundcloud_url, UrlValidationError};

/// How long clients may cache a resolved stream URL
pub const CACHE_TTL_SECONDS: u64 = 3600;

const UNKNOWN: &str = "Unknown";

/// Why a track could not be resolved.
///
/// The `Display` text is the message returned to callers.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("{0}")]
    InvalidUrl(#[from] UrlValidationError),

    #[error("Track not found or unavailable")]
    TrackNotFound(#[source] UpstreamError),

    #[error("Track is blocked in your region")]
    GeoBlocked,

    #[error("Progressive stream not available for this track")]
    NoProgressiveStream,

    #[error("Internal error building stream URL")]
    StreamLocator(#[source] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Stream API error: {0}")]
    Api(u16),

    #[error("Internal server error")]
    Internal(#[source] UpstreamError),

    #[error("No stream URL in response")]
    NoStreamUrl,
}

impl ResolutionError {
    /// Stable error code reported to callers
    pub fn code(&self) -> Cow<'static, str> {
        match self {
            ResolutionError::InvalidUrl(_) => "INVALID_URL".into(),
            ResolutionError::TrackNotFound(_) => "TRACK_NOT_FOUND".into(),
            ResolutionError::GeoBlocked => "GEO_BLOCKED".into(),
            ResolutionError::NoProgressiveStream => "NO_PROGRESSIVE_STREAM".into(),
            ResolutionError::StreamLocator(_) | ResolutionError::Internal(_) => "INTERNAL_ERROR".into(),
            ResolutionError::Network(_) => "NETWORK_ERROR".into(),
            ResolutionError::Api(status) => format!("API_ERROR_{}", status).into(),
            ResolutionError::NoStreamUrl => "NO_STREAM_URL".into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            ResolutionError::StreamLocator(_) | ResolutionError::Internal(_)
        )
    }
}

/// Failures of the stream fetch step
impl From<UpstreamError> for ResolutionError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Transport(e) => ResolutionError::Network(e),
            UpstreamError::Status { status, .. } => ResolutionError::Api(status),
            UpstreamError::MissingStreamUrl => ResolutionError::NoStreamUrl,
            other => ResolutionError::Internal(other),
        }
    }
}

impl IntoResponse for ResolutionError {
    fn into_response(self) -> Response {
        let body = StreamFailureResponse {
            stream_url: None,
            error: self.to_string(),
            error_code: self.code().into_owned(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Metadata returned alongside a stream URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub duration: Option<u64>,
    pub permalink_url: Option<String>,
    pub artwork_url: Option<String>,
    pub genre: Option<String>,
    pub release_date: Option<String>,
}

impl From<CatalogEntry> for TrackInfo {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            title: entry.title().unwrap_or(UNKNOWN).to_string(),
            artist: entry.artist().unwrap_or(UNKNOWN).to_string(),
            duration: entry.duration,
            permalink_url: entry.permalink_url,
            artwork_url: entry.artwork_url,
            genre: entry.genre,
            release_date: entry.release_date,
        }
    }
}

/// A successfully resolved track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub stream_url: String,
    pub track_info: TrackInfo,
    pub cache_ttl: u64,
}

/// Drives the resolve → fetch stream protocol for one track at a time.
#[derive(Debug, Clone)]
pub struct StreamResolver {
    client: Arc<SoundCloudClient>,
    timeout: Duration,
    max_url_len: usize,
}

impl StreamResolver {
    pub fn new(client: Arc<SoundCloudClient>, timeout: Duration, max_url_len: usize) -> Self {
        Self {
            client,
            timeout,
            max_url_len,
        }
    }

    /// Resolve `track_url`, logging the outcome
    pub async fn resolve(&self, track_url: &str) -> Result<ResolvedStream, ResolutionError> {
        let result = self.run(track_url.trim()).await;

        match &result {
            Ok(stream) => info!(title = %stream.track_info.title, "Success: stream URL obtained"),
            Err(e) if e.is_internal() => error!(error = ?e, "Failed: {}", e.code()),
            Err(e) => info!(error = %e, "Failed: {}", e.code()),
        }

        result
    }

    async fn run(&self, track_url: &str) -> Result<ResolvedStream, ResolutionError> {
        validate_soundcloud_url(track_url, self.max_url_len)?;

        // Both upstream calls share one budget.
        let deadline = Instant::now() + self.timeout;

        let entry = self
            .client
            .resolve(track_url, remaining(deadline))
            .await
            .map_err(|e| {
                debug!(error = %e, "Resolve failed");
                ResolutionError::TrackNotFound(e)
            })?;

        if entry.is_blocked() {
            return Err(ResolutionError::GeoBlocked);
        }

        let media_url = entry
            .progressive_url()
            .ok_or(ResolutionError::NoProgressiveStream)?;
        let locator = Url::parse(media_url).map_err(ResolutionError::StreamLocator)?;

        let stream_url = self
            .client
            .fetch_stream_url(locator, remaining(deadline))
            .await?;

        Ok(ResolvedStream {
            stream_url,
            track_info: TrackInfo::from(entry),
            cache_ttl: CACHE_TTL_SECONDS,
        })
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
