//! Database access for Hearth `PostgreSQL`.
//!
//! ## Tables
//!
//! - `hearth.user` - Local accounts (username + Argon2 password hash)
//! - `hearth.session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/web/migrations/` and run via:
//! ```bash
//! cargo run -p hearth-cli -- migrate
//! ```
//!
//! # Connection lifecycle
//!
//! The process owns exactly one [`Database`]. It starts in
//! [`ConnectionState::Connecting`], is probed once at startup by
//! [`Database::establish`], and ends in [`ConnectionState::Disconnected`]
//! after [`Database::close`]. Connection failures are logged and never
//! retried here.

pub mod users;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::sync::watch;

pub use users::{PgUserDirectory, UserDirectory};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique username).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Connection-level failures. These are logged, never surfaced to clients.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The initial connection could not be established.
    #[error("Connection Error! {0}")]
    Connect(#[source] sqlx::Error),

    /// A previously open connection stopped answering.
    #[error("Connection lost: {0}")]
    Lost(#[source] sqlx::Error),
}

/// Observable state of the process-wide database connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, first probe not finished yet.
    Connecting,
    /// Probe succeeded; queries are expected to work.
    Open,
    /// Closed on purpose.
    Disconnected,
    /// Last probe failed.
    Errored,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Disconnected => "disconnected",
            Self::Errored => "errored",
        }
    }
}

/// The single process-wide database handle.
///
/// Cheap to clone; all clones share the pool and the state channel.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl Database {
    /// Create the handle without touching the network.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the connection string cannot be parsed.
    pub fn connect_lazy(database_url: &secrecy::SecretString) -> Result<Self, sqlx::Error> {
        let pool = pool_options().connect_lazy(database_url.expose_secret())?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool. The state starts at `Connecting`.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            pool,
            state: Arc::new(state),
        }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Eagerly open a connection and record the outcome.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::Connect` if the probe fails. The caller is
    /// expected to log and carry on; the state is left at `Errored`.
    pub async fn establish(&self) -> Result<(), ConnectionError> {
        match self.pool.acquire().await {
            Ok(_) => {
                self.transition(ConnectionState::Open);
                Ok(())
            }
            Err(err) => {
                let err = ConnectionError::Connect(err);
                tracing::error!(error = %err, "Connection Error!");
                self.transition(ConnectionState::Errored);
                Err(err)
            }
        }
    }

    /// Probe the connection with a trivial query.
    ///
    /// A failure after the connection was open is reported as
    /// `ConnectionError::Lost`; a success re-opens an errored connection.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the probe fails or the pool is closed.
    pub async fn check(&self) -> Result<(), ConnectionError> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                self.transition(ConnectionState::Open);
                Ok(())
            }
            Err(err) => {
                let err = if self.state() == ConnectionState::Open {
                    ConnectionError::Lost(err)
                } else {
                    ConnectionError::Connect(err)
                };
                tracing::warn!(error = %err, "Database probe failed");
                if self.state() != ConnectionState::Disconnected {
                    self.transition(ConnectionState::Errored);
                }
                Err(err)
            }
        }
    }

    /// Wait until the connection reaches `Open` for the first time.
    ///
    /// Returns the state that ended the wait: `Open`, or a terminal state if
    /// the connection failed or was closed first.
    pub async fn wait_ready(&self) -> ConnectionState {
        let mut rx = self.subscribe();
        let result = rx
            .wait_for(|state| {
                matches!(
                    state,
                    ConnectionState::Open
                        | ConnectionState::Errored
                        | ConnectionState::Disconnected
                )
            })
            .await
            .map(|state| *state);
        // `self` holds the sender, so the channel is never closed here.
        result.unwrap_or(ConnectionState::Disconnected)
    }

    /// Close every pooled connection and move to `Disconnected`.
    pub async fn close(&self) {
        self.pool.close().await;
        self.transition(ConnectionState::Disconnected);
    }

    /// Record a state change, logging only actual transitions.
    fn transition(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous == next {
            return;
        }

        match next {
            ConnectionState::Open => tracing::info!("Database connected"),
            ConnectionState::Disconnected => tracing::info!("Connection Closed"),
            ConnectionState::Errored => {
                tracing::warn!(previous = previous.as_str(), "Database connection errored");
            }
            ConnectionState::Connecting => {}
        }
    }
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(10))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn lazy_database() -> Database {
        Database::connect_lazy(&SecretString::from("postgres://hearth@localhost:1/hearth"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_database_starts_connecting() {
        let db = lazy_database();
        assert_eq!(db.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_close_moves_to_disconnected() {
        let db = lazy_database();
        let mut rx = db.subscribe();

        db.close().await;

        assert_eq!(db.state(), ConnectionState::Disconnected);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_wait_ready_returns_terminal_state_after_close() {
        let db = lazy_database();
        db.close().await;
        assert_eq!(db.wait_ready().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_check_on_closed_pool_keeps_disconnected() {
        let db = lazy_database();
        db.close().await;

        let result = db.check().await;

        assert!(matches!(result, Err(ConnectionError::Connect(_))));
        assert_eq!(db.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = Database::connect_lazy(&SecretString::from("not a url"));
        assert!(result.is_err());
    }
}
