use crate::error::{GatewayError, Result};
use crate::handlers::{get_stream_url, health_check, not_found, post_stream_url, AppState, SharedState};
use crate::middleware::{logging_middleware, rate_limit_middleware};
use crate::config::Config;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use axum::{middleware, Router};
use std::any::Any;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Timeout of the credential check made at startup
const STARTUP_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Server {
    state: SharedState,
    app: Router,
}

impl Server {
    pub fn new(config: Config) -> Result<Self> {
        let state: SharedState = Arc::new(AppState::new(config)?);
        let app = create_app(state.clone());

        Ok(Self { state, app })
    }

    pub async fn run(self) -> Result<()> {
        match self.state.client.validate_credential(STARTUP_CHECK_TIMEOUT).await {
            Ok(()) => tracing::info!("SoundCloud auth token is valid"),
            Err(e) => tracing::warn!("SoundCloud auth token is invalid: {}", e),
        }

        let listener = bind(self.state.config.port).await?;
        let addr = listener.local_addr()?;

        tracing::info!("SoundCloud gateway listening on {}", addr);
        tracing::info!("Health check available at /health");

        axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        self.state.rate_limiter.shutdown().await;
        tracing::info!("Server shutdown completed");

        Ok(())
    }
}

/// Build the router with all routes and middleware
pub fn create_app(state: SharedState) -> Router {
    let limited = Router::new()
        .route("/health", get(health_check).fallback(not_found))
        .route("/stream-url", stream_routes())
        .route("/soundcloud/stream-url", stream_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

    Router::new()
        .merge(limited)
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware))
                .layer(CatchPanicLayer::custom(handle_panic)),
        )
}

fn stream_routes() -> MethodRouter<SharedState> {
    get(get_stream_url).post(post_stream_url).fallback(not_found)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Request handler panicked");

    GatewayError::Internal.into_response()
}

/// Bind the configured port, falling back to a free one when it is taken
async fn bind(port: u16) -> std::io::Result<TcpListener> {
    match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            let listener = TcpListener::bind(("0.0.0.0", 0)).await?;
            tracing::warn!(
                "Port :{} is busy, using :{}",
                port,
                listener.local_addr()?.port()
            );
            Ok(listener)
        }
        Err(e) => Err(e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
