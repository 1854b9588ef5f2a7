//! Author model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::book::Book;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Author {
    pub id: i64,
    pub name: String,
    /// Number of successful rentals of this author's books
    pub popularity: i64,
    #[sqlx(skip)]
    #[serde(default)]
    pub books: Vec<Book>,
}

#[derive(Debug, FromRow)]
pub struct AuthorPageRow {
    pub total_records: i64,
    #[sqlx(flatten)]
    pub author: Author,
}

/// Create author request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAuthor {
    #[validate(length(min = 1, max = 500, message = "must be between 1 and 500 characters"))]
    pub name: String,
}

/// Stable sort by popularity, most popular first. Equal counters keep their order.
pub fn rank_by_popularity(authors: &mut [Author]) {
    authors.sort_by(|a, b| b.popularity.cmp(&a.popularity));
}
