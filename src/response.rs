use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::rate_limiter::RateLimitVerdict;
use crate::resolver::{ResolvedStream, TrackInfo};

/// Name reported by the health endpoint
pub const SERVICE_NAME: &str = "soundcloud-api";

pub fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Serialize)]
pub struct StreamUrlResponse {
    pub stream_url: String,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub track_info: TrackInfo,
    pub cache_info: CacheInfo,
}

#[derive(Debug, Serialize)]
pub struct CacheInfo {
    pub timestamp: String,
    pub ttl_seconds: u64,
}

impl From<ResolvedStream> for StreamUrlResponse {
    fn from(stream: ResolvedStream) -> Self {
        Self {
            stream_url: stream.stream_url,
            error: None,
            error_code: None,
            track_info: stream.track_info,
            cache_info: CacheInfo {
                timestamp: rfc3339(Utc::now()),
                ttl_seconds: stream.cache_ttl,
            },
        }
    }
}

/// Body of a failed resolution
#[derive(Debug, Serialize)]
pub struct StreamFailureResponse {
    pub stream_url: Option<String>,
    pub error: String,
    pub error_code: String,
}

#[derive(Debug, Serialize)]
pub struct RateLimitResponse {
    pub error: String,
    pub details: RateLimitDetails,
}

#[derive(Debug, Serialize)]
pub struct RateLimitDetails {
    pub limit: u32,
    pub window_seconds: u64,
    pub reset_time: String,
}

impl RateLimitResponse {
    pub fn exceeded(verdict: &RateLimitVerdict) -> Self {
        Self {
            error: "Rate limit exceeded".to_string(),
            details: RateLimitDetails {
                limit: verdict.limit,
                window_seconds: verdict.window_seconds,
                reset_time: rfc3339(verdict.reset_at),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_error: Option<String>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self::with_status("healthy", None)
    }

    pub fn degraded(token_error: String) -> Self {
        Self::with_status("degraded", Some(token_error))
    }

    fn with_status(status: &str, token_error: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            service: SERVICE_NAME.to_string(),
            timestamp: rfc3339(Utc::now()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            token_error,
        }
    }
}
