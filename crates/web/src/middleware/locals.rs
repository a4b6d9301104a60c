//! View locals enrichment stage.
//!
//! Builds the per-request [`Locals`] every template receives: the resolved
//! user, and in production the pending flash messages. Outside production
//! the flash queues are left alone and both message lists stay unset.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use super::flash::{self, Flash};
use crate::error::AppError;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Values exposed to every rendered view.
///
/// Also copied onto the response so the error page can render the same
/// navigation as the page that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locals {
    /// The authenticated user, if any.
    pub current_user: Option<CurrentUser>,
    /// Pending error messages; `None` when not collected.
    pub error: Option<Vec<String>>,
    /// Pending success messages; `None` when not collected.
    pub success: Option<Vec<String>>,
}

impl Locals {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    /// Messages of `category` to display, empty when unset.
    #[must_use]
    pub fn messages(&self, category: &str) -> &[String] {
        let messages = match category {
            flash::ERROR => self.error.as_deref(),
            flash::SUCCESS => self.success.as_deref(),
            _ => None,
        };
        messages.unwrap_or_default()
    }
}

/// Pipeline stage: compute [`Locals`] for the request.
///
/// # Errors
///
/// Returns `AppError::Session` if the flash queues cannot be drained.
pub async fn enrich(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let mut locals = Locals {
        current_user: request.extensions().get::<CurrentUser>().cloned(),
        ..Locals::default()
    };

    if state.mode().is_production()
        && let Some(flash) = request.extensions().get::<Flash>().cloned()
    {
        locals.error = Some(flash.take(flash::ERROR).await?);
        locals.success = Some(flash.take(flash::SUCCESS).await?);
    }

    request.extensions_mut().insert(locals.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(locals);
    Ok(response)
}

impl<S> FromRequestParts<S> for Locals
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locals_are_anonymous_and_unset() {
        let locals = Locals::default();
        assert!(!locals.is_authenticated());
        assert_eq!(locals.error, None);
        assert_eq!(locals.success, None);
        assert!(locals.messages(flash::ERROR).is_empty());
    }

    #[test]
    fn test_messages_by_category() {
        let locals = Locals {
            success: Some(vec!["Saved".to_owned()]),
            ..Locals::default()
        };
        assert_eq!(locals.messages(flash::SUCCESS), ["Saved".to_owned()]);
        assert!(locals.messages("other").is_empty());
    }
}
