//! User records and the inputs that create or change them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role given to accounts that do not ask for one
pub const DEFAULT_ROLE: &str = "user";
/// Role allowed to delete accounts
pub const ADMIN_ROLE: &str = "admin";
/// Every role the service accepts
pub const VALID_ROLES: &[&str] = &[DEFAULT_ROLE, ADMIN_ROLE];

/// A user as stored in the database and in the cache.
///
/// The cache treats this as an opaque blob; only `id` and `email` are used
/// for keys. `password_hash` is kept in the cached copy so logins can be
/// served from cache, and is stripped by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone_number: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// A validated user ready to be inserted
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone_number: String,
    pub role: String,
}

/// Input for creating a user, before validation and hashing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserInput {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<String>,
}

impl UpdateUserInput {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.phone_number.is_none()
            && self.role.is_none()
    }
}

/// One page of users plus totals
#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: i64,
}
