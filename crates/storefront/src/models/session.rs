//! Session-related types.
//!
//! The HTTP session stores only the backend access token; everything else
//! about the caller is resolved from the backend per request.

use serde::{Deserialize, Serialize};

use gundam_store_core::UserId;

/// The resolved, signed-in caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user ID.
    pub id: UserId,
    /// Email reported by the auth service.
    pub email: Option<String>,
    /// Username from `profiles`, when the user has one.
    pub username: Option<String>,
    /// Whether the user holds the `admin` role.
    pub is_admin: bool,
}

impl CurrentUser {
    /// Name to greet the user with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Pilot")
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for the backend access token.
    pub const ACCESS_TOKEN: &str = "access_token";
}
