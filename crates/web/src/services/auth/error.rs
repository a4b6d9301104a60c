//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid username format.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] hearth_core::UsernameError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid username or password")]
    InvalidCredentials,

    /// User already exists.
    #[error("a user with the given username is already registered")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Whether the error is the user's to fix (shown back as a flash message).
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidUsername(_)
                | Self::InvalidCredentials
                | Self::UserAlreadyExists
                | Self::WeakPassword(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_is_not_prefixed_twice() {
        let err = AuthError::from(RepositoryError::DataCorruption("bad hash".to_owned()));
        assert_eq!(err.to_string(), "data corruption: bad hash");
    }
}
