//! HTTP server module: session bootstrap, room pages, live streams and
//! controller writes.

pub mod routes;
pub mod state;
pub mod stream;
pub mod view;

use crate::config::Config;
use crate::server::routes::{control, health, rooms, session};
use crate::server::state::AppState;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    // Viewers may be embedded anywhere
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // New session -> new room
        .route("/", get(session::new_session))
        // Public room view and stream
        .route("/:room_id", get(rooms::view_room))
        .route("/:room_id/connect", get(rooms::open_stream))
        // Controller
        .route(
            "/:room_id/control",
            get(control::view_control).post(control::submit_control),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Runs the server until `shutdown` is cancelled.
///
/// Failing to bind is fatal; there is no partial-service mode.
pub async fn serve(config: Config, shutdown: CancellationToken) -> Result<(), ServerError> {
    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(config, shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!("HTTP server listening on http://{}", addr);

    let sweeper = state
        .sessions
        .spawn_sweeper(state.config.sweep_interval, shutdown.child_token());
    let bus = state.bus.clone();

    let signal = shutdown.clone();
    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await
        .map_err(ServerError::Serve);

    // Streams and the sweeper hang off this token.
    shutdown.cancel();
    bus.close();
    if let Err(e) = sweeper.await {
        tracing::warn!(?e, "Session sweeper ended abnormally");
    }

    tracing::info!("HTTP server stopped");
    result
}

/// Errors that stop the server.
#[derive(Debug)]
pub enum ServerError {
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    Serve(std::io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind { addr, source } => write!(f, "Failed to bind {}: {}", addr, source),
            ServerError::Serve(e) => write!(f, "Server error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind { source, .. } => Some(source),
            ServerError::Serve(e) => Some(e),
        }
    }
}
