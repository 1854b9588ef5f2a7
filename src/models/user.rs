//! User model and related types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use super::book::Book;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub deleted: bool,
    /// Optimistic concurrency counter; callers echo it back on update
    pub version: i32,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub rented_books: Vec<Book>,
}

#[derive(Debug, FromRow)]
pub struct UserPageRow {
    pub total_records: i64,
    #[sqlx(flatten)]
    pub user: User,
}

const PASSWORD_MIN_BYTES: usize = 8;
const PASSWORD_MAX_BYTES: usize = 72;

/// Password length is bounded in UTF-8 bytes, not characters
fn validate_password_length(password: &str) -> Result<(), ValidationError> {
    if (PASSWORD_MIN_BYTES..=PASSWORD_MAX_BYTES).contains(&password.len()) {
        return Ok(());
    }
    let mut err = ValidationError::new("length");
    err.message = Some("must be between 8 and 72 bytes long".into());
    Err(err)
}

/// Create user request
#[derive(Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 500, message = "must be between 1 and 500 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "validate_password_length"))]
    pub password: String,
}

impl fmt::Debug for CreateUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Partial user update. `version` must be the version the caller last read.
#[derive(Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 500, message = "must be between 1 and 500 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_password_length"))]
    pub password: Option<String>,
    pub version: i32,
}

impl fmt::Debug for UpdateUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("version", &self.version)
            .finish()
    }
}
