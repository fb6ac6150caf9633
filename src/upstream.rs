//! HTTP client for the SoundCloud v2 API.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::catalog::{decode_object, CatalogEntry, StreamPayload};
use crate::config::Config;
use crate::error::UpstreamError;

/// User-Agent sent with every upstream request
pub const USER_AGENT: &str = concat!("soundcloud-gateway/", env!("CARGO_PKG_VERSION"));

/// SoundCloud API client.
///
/// Each call is a single attempt bounded by the caller's timeout; dropping
/// the returned future aborts the request.
#[derive(Debug, Clone)]
pub struct SoundCloudClient {
    client: Client,
    api_base: Url,
    client_id: String,
}

impl SoundCloudClient {
    pub fn new(api_base: &str, auth_token: &str, client_id: &str) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if !auth_token.is_empty() {
            let mut value = HeaderValue::from_str(&format!("OAuth {}", auth_token))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: Url::parse(api_base.trim_end_matches('/'))?,
            client_id: client_id.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        Self::new(&config.api_base, &config.auth_token, &config.client_id)
    }

    /// Check that the configured credential is accepted
    pub async fn validate_credential(&self, timeout: Duration) -> Result<(), UpstreamError> {
        let url = self.endpoint("me")?;
        let response = self.client.get(url).timeout(timeout).send().await?;
        ensure_ok(response).await.map(drop)
    }

    /// Look up the catalog entry behind a public track URL
    pub async fn resolve(&self, track_url: &str, timeout: Duration) -> Result<CatalogEntry, UpstreamError> {
        let mut url = self.endpoint("resolve")?;
        url.query_pairs_mut()
            .append_pair("url", track_url)
            .append_pair("client_id", &self.client_id);

        debug!(track_url, "Resolving track");

        let response = self.client.get(url).timeout(timeout).send().await?;
        let body = ensure_ok(response).await?.text().await?;
        Ok(decode_object(&body)?)
    }

    /// Follow a transcoding locator to the playable stream URL
    pub async fn fetch_stream_url(&self, locator: Url, timeout: Duration) -> Result<String, UpstreamError> {
        let url = self.with_client_id(locator);

        let response = self.client.get(url).timeout(timeout).send().await?;
        let body = ensure_ok(response).await?.text().await?;
        let payload: StreamPayload = decode_object(&body)?;

        payload
            .stream_url()
            .map(str::to_string)
            .ok_or(UpstreamError::MissingStreamUrl)
    }

    fn endpoint(&self, path: &str) -> Result<Url, UpstreamError> {
        Ok(Url::parse(&format!("{}/{}", self.api_base.as_str().trim_end_matches('/'), path))?)
    }

    fn with_client_id(&self, mut locator: Url) -> Url {
        let pairs: Vec<(String, String)> = locator
            .query_pairs()
            .filter(|(key, _)| key != "client_id")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        locator
            .query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair("client_id", &self.client_id);
        locator
    }
}

async fn ensure_ok(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn client(server: &MockServer, token: &str) -> SoundCloudClient {
        SoundCloudClient::new(&server.uri(), token, "test-client").unwrap()
    }

    #[tokio::test]
    async fn test_validate_credential_sends_oauth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "OAuth secret"))
            .and(header("accept", "application/json"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server, "secret").validate_credential(TIMEOUT).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_credential_reports_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let err = client(&server, "bad").validate_credential(TIMEOUT).await.unwrap_err();
        assert_eq!(err.to_string(), "status code 401: invalid token");
    }

    #[tokio::test]
    async fn test_no_authorization_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        client(&server, "").validate_credential(TIMEOUT).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_resolve_passes_url_and_client_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resolve"))
            .and(query_param("url", "https://soundcloud.com/a/b"))
            .and(query_param("client_id", "test-client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "b",
                "policy": "ALLOW"
            })))
            .mount(&server)
            .await;

        let entry = client(&server, "")
            .resolve("https://soundcloud.com/a/b", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(entry.title(), Some("b"));
    }

    #[tokio::test]
    async fn test_resolve_non_200_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resolve"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server, "")
            .resolve("https://soundcloud.com/a/b", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_resolve_unparsable_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resolve"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server, "")
            .resolve("https://soundcloud.com/a/b", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_stream_url_replaces_client_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/1/stream/progressive"))
            .and(query_param("client_id", "test-client"))
            .and(query_param("track_authorization", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "https://cdn.example/1.mp3"
            })))
            .mount(&server)
            .await;

        let locator = Url::parse(&format!(
            "{}/media/1/stream/progressive?track_authorization=abc&client_id=stale",
            server.uri()
        ))
        .unwrap();

        let url = client(&server, "").fetch_stream_url(locator, TIMEOUT).await.unwrap();
        assert_eq!(url, "https://cdn.example/1.mp3");

        let requests = server.received_requests().await.unwrap();
        let query = requests[0].url.query().unwrap_or_default();
        assert_eq!(query.matches("client_id").count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_stream_url_outcomes() {
        let server = MockServer::start().await;
        Mock::given(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(path("/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let api = client(&server, "");
        let locator = |p: &str| Url::parse(&format!("{}{}", server.uri(), p)).unwrap();

        let err = api.fetch_stream_url(locator("/forbidden"), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 403, .. }));

        let err = api.fetch_stream_url(locator("/empty"), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, UpstreamError::MissingStreamUrl));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let locator = Url::parse(&format!("{}/slow", server.uri())).unwrap();
        let err = client(&server, "")
            .fetch_stream_url(locator, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)));
    }
}
