//! Error types for the lending core

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Postgres SQLSTATE raised when `statement_timeout` cancels a query
const QUERY_CANCELED: &str = "57014";

/// Stable error codes handed to outer layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    NoSuchAuthor = 6,
    RentInvalid = 7,
    DuplicateEmail = 8,
    EditConflict = 9,
    BadValue = 18,
    Timeout = 22,
}

/// Entity kinds that can be reported missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Book,
    Author,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Resource::User => "User",
            Resource::Book => "Book",
            Resource::Author => "Author",
        };
        write!(f, "{}", label)
    }
}

/// Ordered field → reason map. Only the first reason per field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(IndexMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| reason.into());
    }

    /// Record `reason` against `field` unless `ok` holds
    pub fn check(&mut self, ok: bool, field: &str, reason: &str) {
        if !ok {
            self.add(field, reason);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when nothing was recorded, `AppError::Validation` otherwise
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<(String, String)> = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, errs)| {
                errs.first().map(|e| {
                    let reason = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    (field.to_string(), reason)
                })
            })
            .collect();
        fields.sort();

        let mut out = FieldErrors::new();
        for (field, reason) in fields {
            out.add(field, reason);
        }
        out
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(Resource),

    #[error("This book cannot be rented")]
    RentInvalid,

    #[error("Duplicate email")]
    DuplicateEmail,

    #[error("Edit conflict: the record was modified concurrently")]
    EditConflict,

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Operation timed out")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => AppError::Timeout,
            sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
                AppError::Timeout
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.into())
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NotFound(Resource::User) => ErrorCode::NoSuchUser,
            AppError::NotFound(Resource::Book) => ErrorCode::NoSuchBook,
            AppError::NotFound(Resource::Author) => ErrorCode::NoSuchAuthor,
            AppError::RentInvalid => ErrorCode::RentInvalid,
            AppError::DuplicateEmail => ErrorCode::DuplicateEmail,
            AppError::EditConflict => ErrorCode::EditConflict,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Timeout => ErrorCode::Timeout,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    /// Caller-side mistakes (4xx class). Everything else is an I/O failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_)
                | AppError::RentInvalid
                | AppError::DuplicateEmail
                | AppError::EditConflict
                | AppError::Validation(_)
        )
    }

    /// Emit the error at a level matching its class: store and internal
    /// failures at `error`, caller mistakes at `warn`
    pub fn log(&self) {
        match self {
            AppError::Database(e) => tracing::error!("Database error: {:?}", e),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            AppError::Timeout => tracing::error!("Operation timed out"),
            other => tracing::warn!("{}", other),
        }
    }

    /// Whether repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Timeout => true,
            AppError::Database(sqlx::Error::Io(_)) | AppError::Database(sqlx::Error::PoolClosed) => {
                true
            }
            _ => false,
        }
    }
}

/// Kind and constraint name of a database constraint violation, if `err` is one
pub(crate) fn constraint_violation(err: &sqlx::Error) -> Option<(ErrorKind, Option<String>)> {
    match err {
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::Other => None,
            kind => Some((kind, db.constraint().map(str::to_string))),
        },
        _ => None,
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
