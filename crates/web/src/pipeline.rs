//! Request pipeline assembly.
//!
//! The pipeline is an ordered list of [`Stage`]s in front of the route
//! table. Every stage wraps everything after it, and every stage runs before
//! routing, so a rewritten method or a parsed body is visible when the route
//! is chosen. A request that no route claims ends in the not-found failure.
//!
//! Order, outermost first:
//!
//! 1. [`Stage::StaticAssets`] answers from the public directory and stops
//! 2. [`Stage::ErrorPage`] renders any failure raised further in
//! 3. [`Stage::BodyParser`] parses cookies and the body
//! 4. [`Stage::AccessLog`] logs the completed request
//! 5. [`Stage::MethodOverride`] rewrites overridden POST requests
//! 6. [`Stage::Session`] loads the session and resolves the principal
//! 7. [`Stage::Flash`] attaches the flash handle
//! 8. [`Stage::Locals`] computes the view locals
//!
//! The error page sits right inside static assets because it has to enclose
//! every stage that can fail. It only acts on the way out. File system errors
//! from the static stage itself go through the same renderer.

use std::convert::Infallible;

use axum::{Router, extract::Request, middleware, response::IntoResponse};
use tower::{Layer, Service};
use tower_http::services::ServeDir;
use tower_sessions::SessionStore;

use crate::error::AppError;
use crate::middleware::{access_log, body, error_page, flash, locals, method_override, session};
use crate::state::AppState;

/// One stage of the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    StaticAssets,
    ErrorPage,
    BodyParser,
    AccessLog,
    MethodOverride,
    Session,
    Flash,
    Locals,
}

/// The stages in execution order.
pub const STAGES: [Stage; 8] = [
    Stage::StaticAssets,
    Stage::ErrorPage,
    Stage::BodyParser,
    Stage::AccessLog,
    Stage::MethodOverride,
    Stage::Session,
    Stage::Flash,
    Stage::Locals,
];

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StaticAssets => "static_assets",
            Self::ErrorPage => "error_page",
            Self::BodyParser => "body_parser",
            Self::AccessLog => "access_log",
            Self::MethodOverride => "method_override",
            Self::Session => "session",
            Self::Flash => "flash",
            Self::Locals => "locals",
        }
    }

    /// Wrap `inner` with this stage.
    fn wrap<Store>(self, inner: Router, state: &AppState, store: &Store) -> Router
    where
        Store: SessionStore + Clone,
    {
        match self {
            Self::StaticAssets => {
                let assets = ServeDir::new(&state.config().public_dir)
                    .call_fallback_on_method_not_allowed(true)
                    .fallback(inner);
                around(
                    &middleware::from_fn_with_state(state.clone(), error_page::render_errors),
                    Router::new().fallback_service(assets),
                )
            }
            Self::ErrorPage => error_page::wrap(inner, state),
            Self::BodyParser => around(
                &middleware::from_fn_with_state(state.clone(), body::parse_body),
                inner,
            ),
            Self::AccessLog => access_log::wrap(inner),
            Self::MethodOverride => {
                around(&middleware::from_fn(method_override::override_method), inner)
            }
            Self::Session => session::wrap(inner, state, store.clone()),
            Self::Flash => around(&middleware::from_fn(flash::attach_flash), inner),
            Self::Locals => around(
                &middleware::from_fn_with_state(state.clone(), locals::enrich),
                inner,
            ),
        }
    }
}

/// Build the full application: every stage of [`STAGES`] around `routes`.
///
/// `store` backs the session stage.
pub fn build<Store>(state: &AppState, store: Store, routes: Router<AppState>) -> Router
where
    Store: SessionStore + Clone,
{
    let endpoint = routes
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(state.clone());

    STAGES
        .iter()
        .rev()
        .fold(endpoint, |inner, stage| stage.wrap(inner, state, &store))
}

/// Put `layer` in front of `inner` as a whole, ahead of routing.
///
/// `Router::layer` would apply per route, after the route was chosen.
fn around<L>(layer: &L, inner: Router) -> Router
where
    L: Layer<Router>,
    L::Service: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
    <L::Service as Service<Request>>::Response: IntoResponse + 'static,
    <L::Service as Service<Request>>::Future: Send + 'static,
{
    Router::new().fallback_service(layer.layer(inner))
}

/// Terminal handler for requests no route claimed.
async fn not_found() -> AppError {
    AppError::not_found()
}
