//! Graceful shutdown.
//!
//! On Ctrl+C or SIGTERM the server stops accepting connections and lets
//! in-flight requests finish, then the database is closed and the final
//! termination line is logged. The process exits with status 0 afterwards.

use crate::state::{AppState, Lifecycle, LifecycleError};

/// Logged once the database is closed during shutdown.
pub const TERMINATION_MESSAGE: &str = "Connection Closed due to Application Termination";

/// Install the Ctrl+C and SIGTERM handlers and return a future that resolves
/// on the first of them.
///
/// Handlers are registered before this returns, so a signal arriving before
/// the future is polled is not lost.
///
/// # Errors
///
/// Returns the I/O error if a handler cannot be installed.
#[cfg(unix)]
pub fn termination_signal() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {},
            _ = terminate.recv() => {},
        }
    })
}

/// Return a future that resolves on Ctrl+C.
///
/// # Errors
///
/// Never fails on this platform; a failure to listen is logged and the
/// future then never resolves.
#[cfg(not(unix))]
pub fn termination_signal() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    Ok(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    })
}

/// Wait for `trigger`, then move to [`Lifecycle::Draining`].
///
/// Pass to `axum::serve(..).with_graceful_shutdown`, with
/// [`termination_signal`] as the trigger.
pub async fn drain_on<F>(state: AppState, trigger: F)
where
    F: Future<Output = ()>,
{
    trigger.await;

    tracing::info!("Shutdown signal received, starting graceful shutdown");
    if let Err(err) = state.advance(Lifecycle::Draining) {
        tracing::warn!(error = %err, "Shutdown signal in unexpected lifecycle phase");
    }
}

/// Close the database and finish the lifecycle.
///
/// Call after the server has stopped serving. Safe to call when the signal
/// was never received (the state is moved to `Draining` first).
///
/// # Errors
///
/// Returns `LifecycleError` if the process was already closed.
pub async fn close(state: &AppState) -> Result<(), LifecycleError> {
    if state.lifecycle() == Lifecycle::Closed {
        return Err(LifecycleError {
            from: Lifecycle::Closed,
            to: Lifecycle::Closed,
        });
    }

    state.advance(Lifecycle::Draining)?;
    state.database().close().await;
    state.advance(Lifecycle::Closed)?;

    tracing::info!("{TERMINATION_MESSAGE}");
    Ok(())
}
