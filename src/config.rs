use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::error::GatewayError;

pub const DEFAULT_API_BASE: &str = "https://api-v2.soundcloud.com";

/// Longest accepted window or timeout
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 24 * 3600);

#[derive(Debug, Clone, Parser, Validate)]
#[command(name = "soundcloud-gateway")]
#[command(about = "Rate-limited gateway resolving SoundCloud track URLs into stream URLs")]
pub struct Config {
    /// OAuth token forwarded to the SoundCloud API
    #[arg(long, env = "AUTH_TOKEN", default_value = "", hide_env_values = true)]
    pub auth_token: String,

    /// Public application identifier sent as `client_id`
    #[arg(long, env = "CLIENT_ID", default_value = "", hide_env_values = true)]
    pub client_id: String,

    /// Maximum requests per client within one window
    #[arg(long, env = "RATE_LIMIT_REQUESTS", default_value_t = 100)]
    #[validate(range(min = 1))]
    pub rate_limit_requests: u32,

    /// Length of one rate limit window
    #[arg(long, env = "RATE_LIMIT_WINDOW", default_value = "3600s", value_parser = humantime::parse_duration)]
    #[validate(custom(function = "bounded_duration"))]
    pub rate_limit_window: Duration,

    /// Budget for all upstream calls made on behalf of one request
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    #[validate(custom(function = "bounded_duration"))]
    pub request_timeout: Duration,

    /// Longest track URL accepted
    #[arg(long, env = "MAX_TRACK_URL_LEN", default_value_t = 500)]
    #[validate(range(min = 1))]
    pub max_track_url_len: usize,

    /// Port to listen on; a free port is picked when it is taken
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Also append logs to this file
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// SoundCloud API base URL
    #[arg(long, env = "SOUNDCLOUD_API_BASE", default_value = DEFAULT_API_BASE)]
    #[validate(custom(function = "absolute_url"))]
    pub api_base: String,
}

impl Config {
    /// Load configuration from command line arguments and environment variables
    pub fn load() -> Result<Self, GatewayError> {
        let config = Config::try_parse().map_err(|e| GatewayError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Validate the loaded values
    pub fn check(&self) -> Result<(), GatewayError> {
        self.validate()
            .map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Interval at which expired rate limit windows are swept
    pub fn sweep_interval(&self) -> Duration {
        self.rate_limit_window.saturating_mul(2)
    }

    /// Default tracing filter directive for this configuration
    pub fn log_directive(&self) -> String {
        let level = if self.debug { "debug" } else { "info" };
        format!("soundcloud_gateway={level},tower_http={level}")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_token: String::new(),
            client_id: String::new(),
            rate_limit_requests: 100,
            rate_limit_window: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(30),
            max_track_url_len: 500,
            port: 5000,
            log_file: None,
            debug: false,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

fn bounded_duration(value: &Duration) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(ValidationError::new("zero_duration"));
    }
    if *value > MAX_DURATION {
        return Err(ValidationError::new("duration_too_long"));
    }
    Ok(())
}

fn absolute_url(value: &str) -> Result<(), ValidationError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_url"))
}
