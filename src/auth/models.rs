use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles for RBAC in docmind.
///
/// The order of variants matters: `User` is the least privileged.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account, sees only its own documents.
    #[default]
    User = 0,
    /// May manage every user account.
    Admin = 1,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl Role {
    /// Parse a role from a string (case-insensitive).
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }
}

/// A caller whose bearer token has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: ObjectId,
    pub role: Role,
}

/// A verified caller that also holds the admin role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub AuthenticatedUser);

/// Claims carried inside an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Hex-encoded user ObjectId.
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub role: Role,
    /// Expiration timestamp (Unix seconds).
    pub exp: i64,
}
