use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::error::GatewayError;
use crate::health::HealthChecker;
use crate::rate_limiter::RateLimiter;
use crate::resolver::StreamResolver;
use crate::response::StreamUrlResponse;
use crate::upstream::SoundCloudClient;

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Everything request handlers need, built once at startup
pub struct AppState {
    pub config: Arc<Config>,
    pub rate_limiter: RateLimiter,
    pub client: Arc<SoundCloudClient>,
    pub resolver: StreamResolver,
    pub health: HealthChecker,
}

impl AppState {
    /// Build the state; spawns the rate limiter sweep so it needs a runtime
    pub fn new(config: Config) -> Result<Self, GatewayError> {
        let client = Arc::new(SoundCloudClient::from_config(&config)?);

        let rate_limiter = RateLimiter::with_sweep_interval(
            config.rate_limit_requests,
            config.rate_limit_window,
            config.sweep_interval(),
        );
        let resolver = StreamResolver::new(
            client.clone(),
            config.request_timeout,
            config.max_track_url_len,
        );
        let health = HealthChecker::new(client.clone(), config.request_timeout);

        Ok(Self {
            config: Arc::new(config),
            rate_limiter,
            client,
            resolver,
            health,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub track_url: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let (status, body) = state.health.check_health().await;
    (status, Json(body))
}

/// Resolve the track given in the `url` query parameter
pub async fn get_stream_url(
    State(state): State<SharedState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let track_url = query
        .ok()
        .and_then(|Query(query)| query.url)
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            debug!("Missing URL parameter");
            GatewayError::MissingUrlParam
        })?;

    Ok(resolve_track(&state, &track_url).await)
}

/// Resolve the track given as `track_url` in a JSON body
pub async fn post_stream_url(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    if !is_json(&headers) {
        debug!(content_type = ?headers.get(CONTENT_TYPE), "Invalid content type");
        return Err(GatewayError::InvalidContentType);
    }

    let request = parse_request(&body).map_err(|e| {
        debug!("JSON decode error: {}", e);
        GatewayError::InvalidJson
    })?;

    Ok(resolve_track(&state, &request.track_url).await)
}

/// Fallback for unknown paths and methods
pub async fn not_found(method: Method, uri: Uri) -> GatewayError {
    debug!("Not found: {} {}", method, uri.path());
    GatewayError::NotFound
}

async fn resolve_track(state: &AppState, track_url: &str) -> Response {
    match state.resolver.resolve(track_url).await {
        Ok(stream) => (StatusCode::OK, Json(StreamUrlResponse::from(stream))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Decode the first JSON value of a POST body.
///
/// `null` reads as an empty request and anything after the first value is
/// ignored.
fn parse_request(body: &[u8]) -> serde_json::Result<StreamRequest> {
    let mut values = serde_json::Deserializer::from_slice(body).into_iter::<Value>();
    match values.next() {
        Some(Ok(Value::Null)) => Ok(StreamRequest::default()),
        Some(Ok(value)) if value.is_object() => serde_json::from_value(value),
        Some(Ok(_)) => Err(serde::de::Error::custom("request body must be a JSON object")),
        Some(Err(e)) => Err(e),
        None => Err(serde::de::Error::custom("empty request body")),
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_json_content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(is_json(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(!is_json(&headers));
    }

    #[test]
    fn test_stream_request_defaults_missing_field() {
        let request: StreamRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.track_url, "");

        assert!(serde_json::from_str::<StreamRequest>(r#"{"track_url": 5}"#).is_err());
    }

    #[test]
    fn test_parse_request_body() {
        let request = parse_request(br#"{"track_url": "https://soundcloud.com/a/b"}"#).unwrap();
        assert_eq!(request.track_url, "https://soundcloud.com/a/b");

        assert_eq!(parse_request(b"null").unwrap().track_url, "");
        assert_eq!(parse_request(b" null \n").unwrap().track_url, "");

        let request = parse_request(br#"{"track_url": "x"} trailing"#).unwrap();
        assert_eq!(request.track_url, "x");

        assert!(parse_request(b"").is_err());
        assert!(parse_request(b"   ").is_err());
        assert!(parse_request(b"{not json").is_err());
        assert!(parse_request(br#"{"track_url": 5}"#).is_err());
        assert!(parse_request(b"[]").is_err());
    }
}
