//! Health check endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    /// Live sessions.
    pub sessions: usize,
    /// Rooms with at least one open stream.
    pub rooms: usize,
}

/// GET /health - Liveness status.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().timestamp(),
        sessions: state.sessions.len(),
        rooms: state.bus.topic_count(),
    })
}
