//! Authentication service.
//!
//! The local strategy (username + password) and the two halves of principal
//! handling: serializing a user into the token kept in the session, and
//! deserializing that token back into a user on later requests.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use hearth_core::{UserId, Username};

use crate::db::{RepositoryError, UserDirectory};
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service over a user directory.
pub struct AuthService<'a> {
    users: &'a dyn UserDirectory,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a dyn UserDirectory) -> Self {
        Self { users }
    }

    /// Register a new user with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` if the username format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the username is already registered.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = Username::parse(username)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .create(&username, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Verify a username and password (the local strategy).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the user does not exist or
    /// the password is wrong.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = Username::parse(username).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .find_by_username(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Token stored in the session for an authenticated user.
    #[must_use]
    pub const fn serialize_principal(user: &User) -> UserId {
        user.id
    }

    /// Resolve a session token back into a user.
    ///
    /// `Ok(None)` means the user no longer exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn deserialize_principal(&self, token: UserId) -> Result<Option<User>, AuthError> {
        Ok(self.users.find_by_id(token).await?)
    }
}

/// Check password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct Users {
        rows: Mutex<Vec<(User, String)>>,
    }

    #[async_trait]
    impl UserDirectory for Users {
        async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().find(|(u, _)| u.id == id).map(|(u, _)| u.clone()))
        }

        async fn find_by_username(
            &self,
            username: &Username,
        ) -> Result<Option<(User, String)>, RepositoryError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().find(|(u, _)| &u.username == username).cloned())
        }

        async fn create(
            &self,
            username: &Username,
            password_hash: &str,
        ) -> Result<User, RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|(u, _)| &u.username == username) {
                return Err(RepositoryError::Conflict("taken".to_owned()));
            }
            let user = User {
                id: UserId::new(i32::try_from(rows.len()).unwrap() + 1),
                username: username.clone(),
                created_at: Utc::now(),
            };
            rows.push((user.clone(), password_hash.to_owned()));
            Ok(user)
        }
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let users = Users::default();
        let auth = AuthService::new(&users);

        let user = auth.register("Ada", "correct horse").await.unwrap();
        assert_eq!(user.username.as_str(), "ada");

        let found = auth.authenticate("ada", "correct horse").await.unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let users = Users::default();
        let auth = AuthService::new(&users);
        auth.register("ada", "correct horse").await.unwrap();

        let result = auth.authenticate("ada", "battery staple").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user() {
        let users = Users::default();
        let auth = AuthService::new(&users);

        let result = auth.authenticate("nobody", "whatever1").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let users = Users::default();
        let auth = AuthService::new(&users);
        auth.register("ada", "correct horse").await.unwrap();

        let result = auth.register("ADA", "another one").await;
        assert!(matches!(result, Err(AuthError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_register_weak_password() {
        let users = Users::default();
        let auth = AuthService::new(&users);

        let result = auth.register("ada", "short").await;
        assert!(matches!(result, Err(AuthError::WeakPassword(_))));
    }

    #[tokio::test]
    async fn test_principal_roundtrip() {
        let users = Users::default();
        let auth = AuthService::new(&users);
        let user = auth.register("ada", "correct horse").await.unwrap();

        let token = AuthService::serialize_principal(&user);
        let resolved = auth.deserialize_principal(token).await.unwrap();
        assert_eq!(resolved, Some(user));

        let missing = auth.deserialize_principal(UserId::new(999)).await.unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(verify_password("wrong horse", &hash).is_err());
    }
}
