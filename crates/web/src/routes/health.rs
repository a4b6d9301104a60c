//! Health check endpoints.

use axum::{extract::State, http::StatusCode};

use crate::state::{AppState, Lifecycle};

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable while the process is not serving
/// (starting up or draining) or when the database does not answer.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.lifecycle() != Lifecycle::Ready {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    match state.database().check().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
