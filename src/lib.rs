pub mod catalog;
pub mod client_key;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod rate_limiter;
pub mod resolver;
pub mod response;
pub mod server;
pub mod upstream;
pub mod validation;

pub use config::Config;
pub use error::{GatewayError, Result};
pub use rate_limiter::{RateLimitVerdict, RateLimiter};
pub use resolver::{ResolutionError, ResolvedStream, StreamResolver};
pub use server::{create_app, Server};
pub use upstream::SoundCloudClient;
pub use validation::validate_soundcloud_url;
