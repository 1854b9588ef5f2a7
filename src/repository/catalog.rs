//! Catalog repository: books and authors

use std::time::Duration;

use sqlx::{error::ErrorKind, PgExecutor, Pool, Postgres};

use crate::{
    error::{constraint_violation, AppError, AppResult, Resource},
    models::{
        author::{Author, AuthorPageRow, CreateAuthor},
        book::{Book, BookPageRow, BookRow, CreateBook},
        filters::{Filters, Metadata},
    },
};

use super::{begin_bounded, with_deadline};

/// Book columns joined with the author name; expects `books b JOIN authors a`
pub(crate) const BOOK_COLUMNS: &str =
    "b.id, b.title, b.year, b.available, b.author_id, a.name AS author_name";

#[derive(Clone)]
pub struct CatalogRepository {
    pool: Pool<Postgres>,
    transaction_timeout: Duration,
}

impl CatalogRepository {
    pub fn new(pool: Pool<Postgres>, transaction_timeout: Duration) -> Self {
        Self {
            pool,
            transaction_timeout,
        }
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    /// Insert a book and return it joined with its author
    pub async fn create_book(&self, book: &CreateBook) -> AppResult<Book> {
        with_deadline(self.transaction_timeout, async {
            let mut tx = begin_bounded(&self.pool, self.transaction_timeout).await?;

            let id: i64 = sqlx::query_scalar(
                "INSERT INTO books (title, year, author_id) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(&book.title)
            .bind(book.year)
            .bind(book.author_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match constraint_violation(&e) {
                Some((ErrorKind::ForeignKeyViolation, _)) => AppError::NotFound(Resource::Author),
                _ => AppError::from(e),
            })?;

            let created = fetch_book(&mut *tx, id).await?;
            tx.commit().await?;

            Ok(created)
        })
        .await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        fetch_book(&self.pool, id).await
    }

    /// One page of books with their authors
    pub async fn list_books(&self, filters: &Filters) -> AppResult<(Vec<Book>, Metadata)> {
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records, {BOOK_COLUMNS}
            FROM books b
            INNER JOIN authors a ON a.id = b.author_id
            ORDER BY {}
            LIMIT $1 OFFSET $2
            "#,
            filters.order_by("b.id")
        );

        let rows = sqlx::query_as::<_, BookPageRow>(&query)
            .bind(filters.limit())
            .bind(filters.offset())
            .fetch_all(&self.pool)
            .await?;

        let total = match rows.first() {
            Some(row) => row.total_records,
            None if filters.offset() > 0 => {
                sqlx::query_scalar::<_, i64>("SELECT count(*) FROM books")
                    .fetch_one(&self.pool)
                    .await?
            }
            None => 0,
        };

        let books = rows.into_iter().map(|row| row.book.into()).collect();
        Ok((books, filters.metadata(total)))
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    /// Insert an author and read back any books already attributed to its id
    pub async fn create_author(&self, author: &CreateAuthor) -> AppResult<Author> {
        with_deadline(self.transaction_timeout, async {
            let mut tx = begin_bounded(&self.pool, self.transaction_timeout).await?;

            let mut created = sqlx::query_as::<_, Author>(
                "INSERT INTO authors (name) VALUES ($1) RETURNING id, name, popularity",
            )
            .bind(&author.name)
            .fetch_one(&mut *tx)
            .await?;

            created.books = books_by_author(&mut *tx, created.id).await?;
            tx.commit().await?;

            Ok(created)
        })
        .await
    }

    /// Get author by ID, with books
    pub async fn get_author(&self, id: i64) -> AppResult<Author> {
        let mut author = sqlx::query_as::<_, Author>(
            "SELECT id, name, popularity FROM authors WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound(Resource::Author))?;

        author.books = books_by_author(&self.pool, author.id).await?;
        Ok(author)
    }

    /// One page of authors, each hydrated with its books
    pub async fn list_authors(&self, filters: &Filters) -> AppResult<(Vec<Author>, Metadata)> {
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records, a.id, a.name, a.popularity
            FROM authors a
            ORDER BY {}
            LIMIT $1 OFFSET $2
            "#,
            filters.order_by("a.id")
        );

        let rows = sqlx::query_as::<_, AuthorPageRow>(&query)
            .bind(filters.limit())
            .bind(filters.offset())
            .fetch_all(&self.pool)
            .await?;

        let total = match rows.first() {
            Some(row) => row.total_records,
            None if filters.offset() > 0 => {
                sqlx::query_scalar::<_, i64>("SELECT count(*) FROM authors")
                    .fetch_one(&self.pool)
                    .await?
            }
            None => 0,
        };

        // One query per author; fine at catalog scale
        let mut authors = Vec::with_capacity(rows.len());
        for row in rows {
            let mut author = row.author;
            author.books = books_by_author(&self.pool, author.id).await?;
            authors.push(author);
        }

        Ok((authors, filters.metadata(total)))
    }

    /// Set an author's popularity counter back to zero
    pub async fn reset_popularity(&self, id: i64) -> AppResult<Author> {
        let mut author = sqlx::query_as::<_, Author>(
            "UPDATE authors SET popularity = 0 WHERE id = $1 RETURNING id, name, popularity",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound(Resource::Author))?;

        author.books = books_by_author(&self.pool, author.id).await?;
        Ok(author)
    }
}

pub(crate) async fn fetch_book<'e, E>(executor: E, id: i64) -> AppResult<Book>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        "SELECT {BOOK_COLUMNS} FROM books b INNER JOIN authors a ON a.id = b.author_id WHERE b.id = $1"
    );

    sqlx::query_as::<_, BookRow>(&query)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(Book::from)
        .ok_or(AppError::NotFound(Resource::Book))
}

pub(crate) async fn books_by_author<'e, E>(executor: E, author_id: i64) -> AppResult<Vec<Book>>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        r#"
        SELECT {BOOK_COLUMNS}
        FROM books b
        INNER JOIN authors a ON a.id = b.author_id
        WHERE a.id = $1
        ORDER BY b.id
        "#
    );

    let rows = sqlx::query_as::<_, BookRow>(&query)
        .bind(author_id)
        .fetch_all(executor)
        .await?;

    Ok(rows.into_iter().map(Book::from).collect())
}
