//! Book model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Owning author as embedded in a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub year: i32,
    /// False exactly while a rental row references this book
    pub available: bool,
    pub author: AuthorRef,
}

/// Book joined with its author's name, as selected from the database
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    pub id: i64,
    pub title: String,
    pub year: i32,
    pub available: bool,
    pub author_id: i64,
    pub author_name: String,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            year: row.year,
            available: row.available,
            author: AuthorRef {
                id: row.author_id,
                name: row.author_name,
            },
        }
    }
}

/// Book row carrying the windowed `count(*) OVER()` total
#[derive(Debug, FromRow)]
pub struct BookPageRow {
    pub total_records: i64,
    #[sqlx(flatten)]
    pub book: BookRow,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 500, message = "must be between 1 and 500 characters"))]
    pub title: String,
    #[validate(range(min = 0, max = 9999, message = "must be between 0 and 9999"))]
    pub year: i32,
    pub author_id: i64,
}
