use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored account, as read back from the `users` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// Row content written for a new or replaced account
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// Registration and full-update input
#[derive(Debug, Clone, Deserialize)]
pub struct UserSchema {
    pub username: String,
    pub email: String,
    pub password: String,
}

// Never exposes the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserList {
    pub users: Vec<UserPublic>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UsersQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "UsersQuery::default_limit")]
    pub limit: u32,
}

impl UsersQuery {
    fn default_limit() -> u32 {
        100
    }
}

impl Default for UsersQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: Self::default_limit(),
        }
    }
}
