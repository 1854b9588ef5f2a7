//! Rental (active loan) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user currently holding a book. At most one per book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Rental {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub rented_at: DateTime<Utc>,
}

/// A book whose availability flag disagrees with its rental rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct LendingInconsistency {
    pub book_id: i64,
    pub available: bool,
    pub rented_by: Option<i64>,
}
