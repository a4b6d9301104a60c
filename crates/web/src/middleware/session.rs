//! Session stage configuration.
//!
//! Server-side sessions with a signed cookie carrying only the session ID.
//! The store is generic: `PostgreSQL` in the binary, in-memory in tests.

use axum::{Router, middleware};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use tower::Layer;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "hearth_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Derive the cookie signing key from the configured secret.
///
/// `Key` needs 64 bytes of material; the SHA-512 digest of the secret is
/// exactly that long.
#[must_use]
pub fn signing_key(secret: &SecretString) -> Key {
    let digest = Sha512::digest(secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Wrap `inner` with session management, then principal resolution.
pub fn wrap<Store>(inner: Router, state: &AppState, store: Store) -> Router
where
    Store: SessionStore + Clone,
{
    let config = state.config();
    let authenticate = middleware::from_fn_with_state(state.clone(), super::auth::authenticate);

    let sessions = SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(&config.session_secret));

    Router::new().fallback_service(sessions.layer(authenticate.layer(inner)))
}
