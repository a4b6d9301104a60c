//! Principal resolution and login/logout helpers.
//!
//! The session holds only the serialized principal (a [`UserId`]). On every
//! request the authentication stage resolves it back into a
//! [`CurrentUser`] and attaches it to the request extensions. Anything that
//! goes wrong on the way (unreadable session, user deleted, directory down)
//! leaves the request anonymous.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hearth_core::UserId;
use tower_sessions::Session;

use crate::models::{CurrentUser, User, session_keys};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Pipeline stage: bind the session's principal to the request.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = request.extensions().get::<Session>().cloned();

    if let Some(session) = session
        && let Some(user) = resolve_principal(&state, &session).await
    {
        tracing::Span::current().record("user_id", user.id.as_i32());
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

async fn resolve_principal(state: &AppState, session: &Session) -> Option<CurrentUser> {
    let token = match session.get::<UserId>(session_keys::PRINCIPAL).await {
        Ok(token) => token?,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read session, continuing anonymously");
            return None;
        }
    };

    match AuthService::new(state.users()).deserialize_principal(token).await {
        Ok(Some(user)) => Some(CurrentUser::from(user)),
        Ok(None) => {
            tracing::debug!(user_id = %token, "Session principal no longer exists");
            if let Err(err) = session.remove::<UserId>(session_keys::PRINCIPAL).await {
                tracing::warn!(error = %err, "Failed to drop stale principal");
            }
            None
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to resolve principal, continuing anonymously");
            None
        }
    }
}

/// Store the principal for `user` in the session (login).
///
/// The session ID is cycled first so a pre-login ID cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &User,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(session_keys::PRINCIPAL, AuthService::serialize_principal(user))
        .await
}

/// Remove the principal from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<UserId>(session_keys::PRINCIPAL).await?;
    session.cycle_id().await
}
