//! Hearth - server-rendered site with local accounts.
//!
//! This binary serves the site on port 3000 by default.
//!
//! # Architecture
//!
//! - Axum web framework, every request passing through the stage pipeline
//!   in `hearth_web::pipeline`
//! - Askama templates for server-side rendering
//! - `PostgreSQL` for accounts and sessions
//!
//! # Shutdown
//!
//! Ctrl+C or SIGTERM stops accepting connections, waits for in-flight
//! requests, closes the database and exits with status 0.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use hearth_web::config::AppConfig;
use hearth_web::db::{Database, PgUserDirectory};
use hearth_web::state::{AppState, Lifecycle};
use hearth_web::{pipeline, routes, shutdown};
use sentry::integrations::tracing as sentry_tracing;
use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Failures that prevent the server from starting.
#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] hearth_web::config::ConfigError),

    #[error("invalid database URL: {0}")]
    DatabaseUrl(#[source] sqlx::Error),

    #[error("session store error: {0}")]
    SessionStore(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] hearth_web::state::LifecycleError),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &AppConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(std::borrow::Cow::Owned(config.mode.as_str().to_owned())),
            sample_rate: config.sentry.sample_rate,
            traces_sample_rate: config.sentry.traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Initialize tracing with `EnvFilter`, text or JSON output, and Sentry.
fn init_tracing(config: &AppConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hearth=info,hearth_web=info,tower_http=debug".into());

    let (text, json) = if config.json_logs {
        (None, Some(tracing_subscriber::fmt::layer().json().flatten_event(true)))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text)
        .with(json)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // Configuration comes first: it decides Sentry and the log format
    let config = AppConfig::from_env()?;
    let _sentry_guard = init_sentry(&config);
    init_tracing(&config);

    tracing::info!(mode = config.mode.as_str(), "Starting hearth");

    let database =
        Database::connect_lazy(&config.database_url).map_err(StartupError::DatabaseUrl)?;
    if database.establish().await.is_err() {
        tracing::warn!("Serving without a database connection; it is not retried");
    }

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p hearth-cli -- migrate

    let store = PostgresStore::new(database.pool().clone())
        .with_schema_name("hearth")
        .map_err(|e| StartupError::SessionStore(e.to_string()))?
        .with_table_name("session")
        .map_err(|e| StartupError::SessionStore(e.to_string()))?;

    let users = Arc::new(PgUserDirectory::new(database.pool().clone()));
    let state = AppState::new(config.clone(), database, users);

    let app = pipeline::build(&state, store, routes::routes())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let terminated = shutdown::termination_signal().map_err(StartupError::Signal)?;

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    state.advance(Lifecycle::Ready)?;
    tracing::info!("hearth listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown::drain_on(state.clone(), terminated))
    .await
    .map_err(StartupError::Serve)?;

    shutdown::close(&state).await?;
    Ok(())
}
