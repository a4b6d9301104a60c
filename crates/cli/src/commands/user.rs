//! User account management commands.
//!
//! # Usage
//!
//! ```bash
//! hearth-cli user create -u ada -p 'correct horse battery'
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use hearth_core::UserId;
use hearth_web::db::PgUserDirectory;
use hearth_web::services::auth::AuthService;
use secrecy::ExposeSecret;
use sqlx::PgPool;

use super::{CommandError, database_url};

/// Create a new user with the same rules as the registration form.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `CommandError::Auth` if the username or password is rejected or
/// the username is taken.
pub async fn create_user(username: &str, password: &str) -> Result<UserId, CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    let users = PgUserDirectory::new(pool.clone());
    let user = AuthService::new(&users).register(username, password).await?;

    tracing::info!(
        "User created successfully! ID: {}, Username: {}",
        user.id,
        user.username
    );

    pool.close().await;
    Ok(user.id)
}
