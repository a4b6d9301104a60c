//! Session-related types.
//!
//! Types stored in, or resolved from, the session.

use serde::{Deserialize, Serialize};

use hearth_core::{UserId, Username};

use super::User;

/// The authenticated principal attached to a request.
///
/// Resolved from the session once per request by the authentication stage
/// and never written back; the session only holds the [`UserId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's login name.
    pub username: Username,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for the serialized principal (the logged-in user's ID).
    pub const PRINCIPAL: &str = "principal";

    /// Key for the flash message queues.
    pub const FLASH: &str = "flash";
}
