//! Lending repository: the rent/return state machine.
//!
//! A book is `Available` or `Rented`. Both transitions run in one bounded
//! transaction and flip `books.available` with a conditional update
//! (`WHERE available = <expected>`), so of two racing callers only one sees a
//! row affected. The `rentals_book_id_key` unique constraint backs this up on
//! the rental side: a second insert for the same book blocks until the first
//! transaction ends, then fails.

use std::time::Duration;

use sqlx::{error::ErrorKind, PgExecutor, Pool, Postgres};

use crate::{
    error::{constraint_violation, AppError, AppResult, Resource},
    models::{
        book::{Book, BookRow},
        rental::{LendingInconsistency, Rental},
    },
};

use super::{begin_bounded, catalog::BOOK_COLUMNS, catalog::fetch_book, with_deadline};

#[derive(Clone)]
pub struct LendingRepository {
    pool: Pool<Postgres>,
    transaction_timeout: Duration,
}

impl LendingRepository {
    pub fn new(pool: Pool<Postgres>, transaction_timeout: Duration) -> Self {
        Self {
            pool,
            transaction_timeout,
        }
    }

    /// Available → Rented: insert the rental, mark the book unavailable and
    /// bump the author's popularity, all or nothing.
    pub async fn rent_book(&self, book_id: i64, user_id: i64) -> AppResult<Rental> {
        with_deadline(self.transaction_timeout, async {
            let mut tx = begin_bounded(&self.pool, self.transaction_timeout).await?;

            let rental = sqlx::query_as::<_, Rental>(
                r#"
                INSERT INTO rentals (book_id, user_id)
                VALUES ($1, $2)
                RETURNING id, book_id, user_id, rented_at
                "#,
            )
            .bind(book_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(rental_insert_error)?;

            let author_id: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE books
                SET available = false
                WHERE id = $1 AND available = true
                RETURNING author_id
                "#,
            )
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?;

            // Dropping `tx` without commit rolls the rental insert back
            let Some(author_id) = author_id else {
                tracing::warn!("Book {} was not available to rent", book_id);
                return Err(AppError::RentInvalid);
            };

            sqlx::query("UPDATE authors SET popularity = popularity + 1 WHERE id = $1")
                .bind(author_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            Ok(rental)
        })
        .await
    }

    /// Rented → Available: delete the user's rental and mark the book available.
    /// Author popularity is left untouched.
    pub async fn return_book(&self, book_id: i64, user_id: i64) -> AppResult<Book> {
        with_deadline(self.transaction_timeout, async {
            let mut tx = begin_bounded(&self.pool, self.transaction_timeout).await?;

            let deleted = sqlx::query("DELETE FROM rentals WHERE book_id = $1 AND user_id = $2")
                .bind(book_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if deleted == 0 {
                return Err(AppError::NotFound(Resource::Book));
            }

            let flipped = sqlx::query(
                "UPDATE books SET available = true WHERE id = $1 AND available = false",
            )
            .bind(book_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if flipped == 0 {
                tracing::warn!(
                    "Book {} had a rental for user {} but was already available",
                    book_id,
                    user_id
                );
                return Err(AppError::NotFound(Resource::Book));
            }

            let book = fetch_book(&mut *tx, book_id).await?;
            tx.commit().await?;

            Ok(book)
        })
        .await
    }

    /// Active rental for a book, if any
    pub async fn rental_for_book(&self, book_id: i64) -> AppResult<Option<Rental>> {
        let rental = sqlx::query_as::<_, Rental>(
            "SELECT id, book_id, user_id, rented_at FROM rentals WHERE book_id = $1",
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rental)
    }

    /// Books currently rented by a user
    pub async fn rented_books(&self, user_id: i64) -> AppResult<Vec<Book>> {
        rented_books(&self.pool, user_id).await
    }

    /// Books whose availability flag disagrees with the rentals table
    pub async fn audit(&self) -> AppResult<Vec<LendingInconsistency>> {
        let rows = sqlx::query_as::<_, LendingInconsistency>(
            r#"
            SELECT b.id AS book_id, b.available, r.user_id AS rented_by
            FROM books b
            LEFT JOIN rentals r ON r.book_id = b.id
            WHERE b.available = (r.id IS NOT NULL)
            ORDER BY b.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Translate a failed rental insert: an existing rental or a missing book means
/// the book cannot be rented, a missing user is reported as such.
fn rental_insert_error(err: sqlx::Error) -> AppError {
    match constraint_violation(&err) {
        Some((ErrorKind::UniqueViolation, _)) => {
            tracing::warn!("Rental insert lost the race: {}", err);
            AppError::RentInvalid
        }
        Some((ErrorKind::ForeignKeyViolation, Some(constraint)))
            if constraint == "rentals_user_id_fkey" =>
        {
            AppError::NotFound(Resource::User)
        }
        Some((ErrorKind::ForeignKeyViolation, _)) => AppError::RentInvalid,
        _ => AppError::from(err),
    }
}

pub(crate) async fn rented_books<'e, E>(executor: E, user_id: i64) -> AppResult<Vec<Book>>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        r#"
        SELECT {BOOK_COLUMNS}
        FROM rentals r
        INNER JOIN books b ON b.id = r.book_id
        INNER JOIN authors a ON a.id = b.author_id
        WHERE r.user_id = $1
        ORDER BY r.rented_at, b.id
        "#
    );

    let rows = sqlx::query_as::<_, BookRow>(&query)
        .bind(user_id)
        .fetch_all(executor)
        .await?;

    Ok(rows.into_iter().map(Book::from).collect())
}
