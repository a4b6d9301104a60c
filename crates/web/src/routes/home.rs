//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::IntoResponse;

use crate::filters;
use crate::middleware::Locals;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub locals: Locals,
}

/// Display the home page.
pub async fn home(locals: Locals) -> impl IntoResponse {
    HomeTemplate { locals }
}
