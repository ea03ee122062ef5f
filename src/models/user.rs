//! User model
//!
//! The `User` entity plus the inputs accepted by the user service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// UUID string
    pub id: String,
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh id.
    ///
    /// The password must already be hashed; see `services::password::hash_password`.
    pub fn new(username: String, email: String, password_hash: String) -> AppResult<Self> {
        if username.trim().is_empty() {
            return Err(AppError::validation("username must not be empty"));
        }
        if email.trim().is_empty() {
            return Err(AppError::validation("email must not be empty"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Registration request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Partial user update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    /// New plaintext password (will be hashed)
    pub password: Option<String>,
}
