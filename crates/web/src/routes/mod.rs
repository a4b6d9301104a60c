//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /              - Home page
//! GET    /login         - Login page
//! POST   /login         - Login action
//! GET    /register      - Register page
//! POST   /register      - Register action
//! POST   /logout        - Logout action
//! DELETE /logout        - Logout action (forms send POST + _method=DELETE)
//! GET    /health        - Liveness probe
//! GET    /health/ready  - Readiness probe (lifecycle + database)
//! ```

pub mod auth;
pub mod health;
pub mod home;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout).delete(auth::logout))
}

/// Create the full route table. Unmatched requests are handled by the
/// pipeline's not-found fallback.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(auth_routes())
}
