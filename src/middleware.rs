use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client_key::client_key;
use crate::handlers::SharedState;
use crate::response::RateLimitResponse;

/// Logging middleware for request/response tracking
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    // Path only, the query carries track URLs.
    let path = request.uri().path().to_string();
    let client = client_key(&request);
    let request_id = Uuid::new_v4();

    let span = info_span!("request", %request_id, %client);

    async move {
        info!(
            target: "soundcloud_gateway::middleware",
            method = %method,
            path = %path,
            "Incoming request"
        );

        let mut response = next.run(request).await;

        info!(
            target: "soundcloud_gateway::middleware",
            method = %method,
            path = %path,
            status = %response.status(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("x-request-id", value);
        }
        response
    }
    .instrument(span)
    .await
}

/// Admission check run before any rate limited route
pub async fn rate_limit_middleware(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    let verdict = state.rate_limiter.admit(&client);

    if !verdict.limited {
        return next.run(request).await;
    }

    warn!(client = %client, limit = verdict.limit, "Rate limit exceeded");

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitResponse::exceeded(&verdict)),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(verdict.limit));
    headers.insert("retry-after", HeaderValue::from(verdict.retry_after_secs()));

    response
}
