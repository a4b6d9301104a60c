//! Unified error handling with Sentry integration.
//!
//! Every request-scoped failure is an [`AppError`]. Converting one into a
//! response does not render anything: it produces a bare status response
//! carrying a [`Failure`] extension, which the error page stage turns into the
//! rendered error view. That stage is the only place error pages are built.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request body could not be parsed per its declared content type.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Request body exceeded the configured limit.
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// No route matched, or the resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Template rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Any other failure, including panics inside handlers.
    #[error("Unhandled error: {0}")]
    Unhandled(String),
}

impl AppError {
    /// Synthesize the failure produced when no route matched.
    #[must_use]
    pub fn not_found() -> Self {
        Self::NotFound("Not Found".to_owned())
    }

    /// HTTP status this failure maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::InvalidUsername(_) | AuthError::WeakPassword(_) => {
                    StatusCode::BAD_REQUEST
                }
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Database(_) | Self::Session(_) | Self::Template(_) | Self::Unhandled(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable name of the failure class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "MalformedInput",
            Self::PayloadTooLarge { .. } => "PayloadTooLarge",
            Self::NotFound(_) => "NotFound",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Database(_) => "Database",
            Self::Session(_) => "Session",
            Self::Template(_) => "Template",
            Self::Auth(_) => "Auth",
            Self::Unhandled(_) => "Unhandled",
        }
    }

    /// Message shown on the error page in every operating mode.
    ///
    /// Infrastructure failures only show the status reason; their text is
    /// part of the development-only detail.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::MalformedInput(msg)
            | Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Unhandled(msg) => msg.clone(),
            Self::PayloadTooLarge { .. } => "request entity too large".to_owned(),
            Self::Auth(err) if err.is_user_facing() => err.to_string(),
            Self::Database(_) | Self::Session(_) | Self::Template(_) | Self::Auth(_) => {
                status_reason(self.status())
            }
        }
    }

    /// Capture everything the error page needs from this failure.
    #[must_use]
    pub fn to_failure(&self) -> Failure {
        let mut causes = Vec::new();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            causes.push(err.to_string());
            source = err.source();
        }

        Failure {
            status: self.status().as_u16(),
            kind: self.kind(),
            message: self.message(),
            description: self.to_string(),
            causes,
        }
    }
}

/// A failure travelling from the stage that raised it to the error page.
///
/// Stored in response extensions by [`AppError::into_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// HTTP status code.
    pub status: u16,
    /// Failure class, see [`AppError::kind`].
    pub kind: &'static str,
    /// Client-facing message.
    pub message: String,
    /// Full description, including the failure class.
    pub description: String,
    /// Messages of the underlying error chain, outermost first.
    pub causes: Vec<String>,
}

impl Failure {
    /// Failure for an error response that was produced without one, such as
    /// a session store or file system error inside a library layer.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        let message = status_reason(status);
        Self {
            status: status.as_u16(),
            kind: "Unhandled",
            description: format!("Unhandled error: {status}"),
            message,
            causes: Vec::new(),
        }
    }

    /// Status as a `StatusCode`, falling back to 500 for out-of-range values.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

fn status_reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Error").to_owned()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request failed");
        }

        let mut response = status.into_response();
        response.extensions_mut().insert(self.to_failure());
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after a successful login.
pub fn set_sentry_user(user_id: &impl ToString, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_owned()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
