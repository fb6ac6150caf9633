use anyhow::{Context, Result};
use soundcloud_gateway::config::Config;
use soundcloud_gateway::server::Server;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_tracing(&config)?;

    tracing::info!("Starting SoundCloud gateway");
    tracing::info!(
        "Configuration: port={}, rate_limit={} per {:?}, request_timeout={:?}, auth_token_set={}",
        config.port,
        config.rate_limit_requests,
        config.rate_limit_window,
        config.request_timeout,
        !config.auth_token.is_empty()
    );

    let server = Server::new(config)
        .map_err(|e| anyhow::anyhow!("Failed to create server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

fn init_tracing(config: &Config) -> Result<()> {
    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("can't open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_directive().into()),
        )
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}
