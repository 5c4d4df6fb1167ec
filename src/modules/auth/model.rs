use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A login known to the service. Only the argon2 hash of the password is kept.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// Built-in accounts as `(id, username, password, role)`.
pub const FIXED_ACCOUNTS: [(&str, &str, &str, UserRole); 2] = [
    ("1", "admin", "admin123", UserRole::Admin),
    ("2", "angus", "pass123", UserRole::User),
];
