//! Application state shared across handlers and pipeline stages.
//!
//! There is no ambient global: the database, the user directory and the
//! configuration live in one [`AppState`] built at startup and handed to every
//! stage. The state also carries the process [`Lifecycle`].

use std::sync::Arc;

use hearth_core::OperatingMode;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::db::{Database, UserDirectory};

/// Process lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lifecycle {
    /// State built, server not accepting yet.
    Init,
    /// Serving requests.
    Ready,
    /// Shutdown signal received; finishing in-flight requests.
    Draining,
    /// Database closed; the process is about to exit.
    Closed,
}

impl Lifecycle {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }
}

/// Error returned for a backwards lifecycle transition.
#[derive(Debug, thiserror::Error)]
#[error("invalid lifecycle transition from {from:?} to {to:?}")]
pub struct LifecycleError {
    pub from: Lifecycle,
    pub to: Lifecycle,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    database: Database,
    users: Arc<dyn UserDirectory>,
    lifecycle: watch::Sender<Lifecycle>,
}

impl AppState {
    /// Create a new application state in [`Lifecycle::Init`].
    #[must_use]
    pub fn new(config: AppConfig, database: Database, users: Arc<dyn UserDirectory>) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::Init);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                database,
                users,
                lifecycle,
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Shortcut for the configured operating mode.
    #[must_use]
    pub fn mode(&self) -> &OperatingMode {
        &self.inner.config.mode
    }

    /// Get a reference to the process-wide database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.inner.database
    }

    /// Get a reference to the user directory.
    #[must_use]
    pub fn users(&self) -> &dyn UserDirectory {
        self.inner.users.as_ref()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        *self.inner.lifecycle.borrow()
    }

    /// Subscribe to lifecycle changes.
    #[must_use]
    pub fn subscribe_lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.inner.lifecycle.subscribe()
    }

    /// Move the lifecycle forward. Re-entering the current phase is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError` if `to` is earlier than the current phase.
    pub fn advance(&self, to: Lifecycle) -> Result<(), LifecycleError> {
        let mut result = Ok(());
        self.inner.lifecycle.send_if_modified(|current| {
            if to < *current {
                result = Err(LifecycleError { from: *current, to });
                return false;
            }
            if to == *current {
                return false;
            }
            tracing::info!(from = current.as_str(), to = to.as_str(), "Lifecycle transition");
            *current = to;
            true
        });
        result
    }
}
