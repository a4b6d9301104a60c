//! Authentication route handlers.
//!
//! Local username/password login and registration. Outcomes are reported to
//! the next page through flash messages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
};
use tower_sessions::Session;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{Flash, Locals, ParsedBody, clear_current_user, set_current_user};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Login credentials, from a form or a JSON body.
#[derive(Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl TryFrom<&ParsedBody> for LoginForm {
    type Error = AppError;

    fn try_from(body: &ParsedBody) -> Result<Self> {
        Ok(Self {
            username: body.require("username")?.to_owned(),
            password: body.require("password")?.to_owned(),
        })
    }
}

/// Registration data, from a form or a JSON body.
#[derive(Debug)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
}

impl TryFrom<&ParsedBody> for RegisterForm {
    type Error = AppError;

    fn try_from(body: &ParsedBody) -> Result<Self> {
        Ok(Self {
            username: body.require("username")?.to_owned(),
            password: body.require("password")?.to_owned(),
            password_confirm: body.require("password_confirm")?.to_owned(),
        })
    }
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub locals: Locals,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub locals: Locals,
}

/// Display the login page.
pub async fn login_page(locals: Locals) -> impl IntoResponse {
    LoginTemplate { locals }
}

/// Handle login form submission.
///
/// # Errors
///
/// Fails with `MalformedInput` when a credential field is missing, and on
/// session or directory errors. Wrong credentials are reported through a
/// flash message.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    flash: Flash,
    body: ParsedBody,
) -> Result<Redirect> {
    let form = LoginForm::try_from(&body)?;
    let auth = AuthService::new(state.users());

    match auth.authenticate(&form.username, &form.password).await {
        Ok(user) => {
            set_current_user(&session, &user).await?;
            set_sentry_user(&user.id, user.username.as_str());
            tracing::info!(user_id = %user.id, "User logged in");

            flash.success(format!("Welcome back, {}!", user.username)).await?;
            Ok(Redirect::to("/"))
        }
        Err(err) if err.is_user_facing() => {
            tracing::debug!(error = %err, "Login rejected");
            flash.error("Invalid username or password").await?;
            Ok(Redirect::to("/login"))
        }
        Err(err) => Err(err.into()),
    }
}

/// Display the registration page.
pub async fn register_page(locals: Locals) -> impl IntoResponse {
    RegisterTemplate { locals }
}

/// Handle registration form submission. A new account is logged in right
/// away.
///
/// # Errors
///
/// Fails with `MalformedInput` when a field is missing, and on session or
/// directory errors. Validation problems are reported through a flash
/// message.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    flash: Flash,
    body: ParsedBody,
) -> Result<Redirect> {
    let form = RegisterForm::try_from(&body)?;
    if form.password != form.password_confirm {
        flash.error("Passwords do not match").await?;
        return Ok(Redirect::to("/register"));
    }

    let auth = AuthService::new(state.users());

    match auth.register(&form.username, &form.password).await {
        Ok(user) => {
            set_current_user(&session, &user).await?;
            set_sentry_user(&user.id, user.username.as_str());
            tracing::info!(user_id = %user.id, "User registered");

            flash.success(format!("Welcome, {}!", user.username)).await?;
            Ok(Redirect::to("/"))
        }
        Err(err) if err.is_user_facing() => {
            flash.error(err.to_string()).await?;
            Ok(Redirect::to("/register"))
        }
        Err(err) => Err(err.into()),
    }
}

/// Log out. Reached by `POST /logout` and by `DELETE /logout` through method
/// override.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn logout(session: Session, flash: Flash) -> Result<Redirect> {
    clear_current_user(&session).await?;
    clear_sentry_user();

    flash.success("You have been logged out").await?;
    Ok(Redirect::to("/"))
}
