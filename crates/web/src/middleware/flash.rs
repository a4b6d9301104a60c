//! Session-backed flash messages.
//!
//! Messages are queued per category in the session under one key and removed
//! when read, so each message is shown at most once. Two concurrent requests
//! on the same session may race; the last write wins.

use std::collections::BTreeMap;

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::session_keys;

/// Category for failure messages.
pub const ERROR: &str = "error";

/// Category for confirmation messages.
pub const SUCCESS: &str = "success";

type Queues = BTreeMap<String, Vec<String>>;

/// Handle to the flash queues of the current session.
#[derive(Debug, Clone)]
pub struct Flash {
    session: Session,
}

impl Flash {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Queue a message under `category`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be read or written.
    pub async fn push(
        &self,
        category: &str,
        message: impl Into<String>,
    ) -> Result<(), tower_sessions::session::Error> {
        let mut queues: Queues = self
            .session
            .get(session_keys::FLASH)
            .await?
            .unwrap_or_default();
        queues
            .entry(category.to_owned())
            .or_default()
            .push(message.into());
        self.session.insert(session_keys::FLASH, queues).await
    }

    /// Remove and return every message queued under `category`.
    ///
    /// Reading an empty category does not touch the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be read or written.
    pub async fn take(&self, category: &str) -> Result<Vec<String>, tower_sessions::session::Error> {
        let Some(mut queues) = self.session.get::<Queues>(session_keys::FLASH).await? else {
            return Ok(Vec::new());
        };

        let Some(messages) = queues.remove(category) else {
            return Ok(Vec::new());
        };

        if queues.is_empty() {
            self.session.remove_value(session_keys::FLASH).await?;
        } else {
            self.session.insert(session_keys::FLASH, queues).await?;
        }

        Ok(messages)
    }

    /// Queue an error message.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be read or written.
    pub async fn error(&self, message: impl Into<String>) -> Result<(), tower_sessions::session::Error> {
        self.push(ERROR, message).await
    }

    /// Queue a success message.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be read or written.
    pub async fn success(
        &self,
        message: impl Into<String>,
    ) -> Result<(), tower_sessions::session::Error> {
        self.push(SUCCESS, message).await
    }
}

/// Pipeline stage: attach a [`Flash`] handle bound to the request's session.
pub async fn attach_flash(mut request: Request, next: Next) -> Response {
    if let Some(session) = request.extensions().get::<Session>().cloned() {
        request.extensions_mut().insert(Flash::new(session));
    }

    next.run(request).await
}

impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| AppError::Unhandled("flash messages need a session".to_owned()))
    }
}
