//! User model as seen by the authentication core.
//!
//! Users are created once at sign-up and only read afterwards.

use crate::types::DbId;

/// A stored user. `password_hash` is the output of the configured hasher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub username: String,
    pub password_hash: String,
}

/// DTO for creating a new user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub password_hash: String,
}
