//! Central error page.
//!
//! Every failure raised by a stage or a route becomes a response carrying a
//! [`Failure`] extension. This stage wraps all of them, and is the one place
//! where a failure is turned into a rendered page: the status is kept, the
//! message is always shown, and the full failure detail is shown only in
//! development. Panics in handlers are caught and rendered the same way.

use std::any::Any;

use askama::Template;
use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
};
use hearth_core::OperatingMode;
use tower::Layer;
use tower_http::catch_panic::CatchPanicLayer;

use super::locals::Locals;
use crate::error::{AppError, Failure};
use crate::filters;
use crate::state::AppState;

/// Failure detail exposed to the error view.
///
/// Empty outside development.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetail {
    pub status: Option<u16>,
    pub kind: Option<&'static str>,
    pub description: Option<String>,
    pub causes: Vec<String>,
}

impl ErrorDetail {
    /// Detail to show for `failure` in `mode`.
    #[must_use]
    pub fn for_mode(mode: &OperatingMode, failure: &Failure) -> Self {
        if mode.is_development() {
            Self {
                status: Some(failure.status),
                kind: Some(failure.kind),
                description: Some(failure.description.clone()),
                causes: failure.causes.clone(),
            }
        } else {
            Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Marks a response already rendered by this stage.
#[derive(Debug, Clone, Copy)]
struct Rendered;

/// Error page template.
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub message: String,
    pub status: u16,
    pub error: ErrorDetail,
    pub locals: Locals,
}

/// Wrap `inner` with the error renderer and a panic catcher.
pub fn wrap(inner: Router, state: &AppState) -> Router {
    let render = middleware::from_fn_with_state(state.clone(), render_errors);
    let catch_panic = CatchPanicLayer::custom(panic_response);

    Router::new().fallback_service(render.layer(catch_panic.layer(inner)))
}

/// Pipeline stage: render responses that carry a [`Failure`].
///
/// Error statuses produced without one (library layers answering on their
/// own) are rendered from the status alone.
pub async fn render_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.extensions().get::<Rendered>().is_some() {
        return response;
    }

    let failure = match response.extensions().get::<Failure>() {
        Some(failure) => failure.clone(),
        None if is_error(response.status()) => {
            tracing::warn!(
                status = response.status().as_u16(),
                "Error response without a failure"
            );
            Failure::from_status(response.status())
        }
        None => return response,
    };
    let locals = response
        .extensions()
        .get::<Locals>()
        .cloned()
        .unwrap_or_default();

    render_failure(state.mode(), &failure, locals)
}

fn is_error(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

/// Render the error view for `failure`.
///
/// Falls back to a plain-text body with the same status if the template
/// itself fails to render.
#[must_use]
pub fn render_failure(mode: &OperatingMode, failure: &Failure, locals: Locals) -> Response {
    let status = failure.status_code();
    let page = ErrorTemplate {
        message: failure.message.clone(),
        status: status.as_u16(),
        error: ErrorDetail::for_mode(mode, failure),
        locals,
    };

    let mut response = match page.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to render error page");
            (status, failure.message.clone()).into_response()
        }
    };
    response.extensions_mut().insert(Rendered);
    response
}

/// Turn a handler panic into an unhandled failure.
#[allow(clippy::needless_pass_by_value)]
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else {
        "handler panicked".to_owned()
    };

    AppError::Unhandled(message).into_response()
}
