//! Request pipeline stages.
//!
//! Each module provides one stage of the pipeline assembled in
//! [`crate::pipeline`]. Stages communicate through request extensions:
//!
//! - [`body`] inserts [`ParsedBody`] and [`RequestCookies`]
//! - [`method_override`] inserts [`OriginalMethod`] when it rewrites a method
//! - [`session`] inserts the `tower_sessions::Session`, then [`auth`] the
//!   resolved [`CurrentUser`](crate::models::CurrentUser)
//! - [`flash`] inserts the [`Flash`] handle
//! - [`locals`] inserts [`Locals`] (and copies them onto the response)
//!
//! Failures travel back out as a `Failure` response extension and are
//! rendered by [`error_page`].

pub mod access_log;
pub mod auth;
pub mod body;
pub mod error_page;
pub mod flash;
pub mod locals;
pub mod method_override;
pub mod session;

pub use access_log::{REQUEST_ID_HEADER, request_id_middleware};
pub use auth::{clear_current_user, set_current_user};
pub use body::{ParsedBody, RequestCookies};
pub use error_page::{ErrorDetail, render_failure};
pub use flash::Flash;
pub use locals::Locals;
pub use method_override::OriginalMethod;
pub use session::SESSION_COOKIE_NAME;
