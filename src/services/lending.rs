//! Lending service: renting and returning books

use crate::{
    error::{AppError, AppResult},
    models::{book::Book, rental::{LendingInconsistency, Rental}},
    repository::Repository,
};

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
}

impl LendingService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Rent a book to a user
    pub async fn rent_book(&self, book_id: i64, user_id: i64) -> AppResult<Rental> {
        // Soft-deleted users still satisfy the foreign key, so check explicitly
        self.repository.users.get_by_id(user_id).await.inspect_err(AppError::log)?;

        let rental = self
            .repository
            .lending
            .rent_book(book_id, user_id)
            .await
            .inspect_err(AppError::log)?;
        tracing::info!("Book {} rented by user {}", book_id, user_id);
        Ok(rental)
    }

    /// Return a book the user currently holds
    pub async fn return_book(&self, book_id: i64, user_id: i64) -> AppResult<Book> {
        let book = self
            .repository
            .lending
            .return_book(book_id, user_id)
            .await
            .inspect_err(AppError::log)?;
        tracing::info!("Book {} returned by user {}", book_id, user_id);
        Ok(book)
    }

    /// Who holds a book right now, if anyone
    pub async fn current_rental(&self, book_id: i64) -> AppResult<Option<Rental>> {
        self.repository.catalog.get_book(book_id).await.inspect_err(AppError::log)?;
        self.repository.lending.rental_for_book(book_id).await.inspect_err(AppError::log)
    }

    /// Books a user currently holds
    pub async fn rented_books(&self, user_id: i64) -> AppResult<Vec<Book>> {
        self.repository.users.get_by_id(user_id).await.inspect_err(AppError::log)?;
        self.repository.lending.rented_books(user_id).await.inspect_err(AppError::log)
    }

    /// Check that every book's availability matches its rental rows
    pub async fn audit(&self) -> AppResult<Vec<LendingInconsistency>> {
        let found = self.repository.lending.audit().await.inspect_err(AppError::log)?;
        for row in &found {
            tracing::error!(
                "Book {} is marked available={} but rented_by={:?}",
                row.book_id,
                row.available,
                row.rented_by
            );
        }
        Ok(found)
    }
}
