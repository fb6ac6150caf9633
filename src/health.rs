use axum::http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::response::HealthResponse;
use crate::upstream::SoundCloudClient;

/// Reports service health by checking the upstream credential.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    client: Arc<SoundCloudClient>,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(client: Arc<SoundCloudClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn check_health(&self) -> (StatusCode, HealthResponse) {
        match self.client.validate_credential(self.timeout).await {
            Ok(()) => {
                debug!("Token validation successful");
                (StatusCode::OK, HealthResponse::healthy())
            }
            Err(e) => {
                error!("Token validation failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, HealthResponse::degraded(e.to_string()))
            }
        }
    }
}
