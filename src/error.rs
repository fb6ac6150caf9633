use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised at the HTTP boundary or while starting the service.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Content-Type must be application/json")]
    InvalidContentType,

    #[error("Invalid JSON body")]
    InvalidJson,

    #[error("Missing 'url' parameter")]
    MissingUrlParam,

    #[error("Endpoint not found")]
    NotFound,

    #[error("Internal server error")]
    Internal,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream client error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidContentType
            | GatewayError::InvalidJson
            | GatewayError::MissingUrlParam => StatusCode::BAD_REQUEST,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Internal
            | GatewayError::Config(_)
            | GatewayError::Upstream(_)
            | GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::InvalidContentType => "INVALID_CONTENT_TYPE",
            GatewayError::InvalidJson => "INVALID_JSON",
            GatewayError::MissingUrlParam => "MISSING_URL_PARAM",
            GatewayError::NotFound => "NOT_FOUND",
            GatewayError::Internal
            | GatewayError::Config(_)
            | GatewayError::Upstream(_)
            | GatewayError::Io(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if status.is_server_error() {
            // Internal details stay in the logs.
            tracing::error!(error = %self, "Request failed with internal error");
            ErrorResponse::internal()
        } else {
            ErrorResponse::new(&self.to_string(), self.error_code())
        };

        (status, Json(body)).into_response()
    }
}

/// Raw failure outcomes of the upstream API client.
///
/// These are deliberately independent of the public error codes; the
/// resolver decides how each one is reported.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0}")]
    Transport(#[source] reqwest::Error),

    #[error("status code {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response did not contain a stream URL")]
    MissingStreamUrl,

    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs carry the client_id, keep them out of messages.
        UpstreamError::Transport(err.without_url())
    }
}

/// JSON body shared by every `{error, error_code}` reply.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl ErrorResponse {
    pub fn new(error: &str, error_code: &str) -> Self {
        Self {
            error: error.to_string(),
            error_code: error_code.to_string(),
        }
    }

    pub fn internal() -> Self {
        Self::new("Internal server error", "INTERNAL_ERROR")
    }
}
