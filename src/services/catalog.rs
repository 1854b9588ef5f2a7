//! Catalog service: books, authors and popularity ranking

use validator::Validate;

use crate::{
    config::ListingConfig,
    error::{AppError, AppResult},
    models::{
        author::{rank_by_popularity, Author, CreateAuthor},
        book::{Book, CreateBook},
        filters::{Filters, ListParams, Page, AUTHOR_SORT, BOOK_SORT},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    listing: ListingConfig,
}

impl CatalogService {
    pub fn new(repository: Repository, listing: ListingConfig) -> Self {
        Self { repository, listing }
    }

    /// Create a book attributed to an existing author
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate().map_err(AppError::from).inspect_err(AppError::log)?;
        let created = self
            .repository
            .catalog
            .create_book(&book)
            .await
            .inspect_err(AppError::log)?;
        tracing::info!("Created book {} for author {}", created.id, created.author.id);
        Ok(created)
    }

    /// Create an author
    pub async fn create_author(&self, author: CreateAuthor) -> AppResult<Author> {
        author.validate().map_err(AppError::from).inspect_err(AppError::log)?;
        let created = self
            .repository
            .catalog
            .create_author(&author)
            .await
            .inspect_err(AppError::log)?;
        tracing::info!("Created author {}", created.id);
        Ok(created)
    }

    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        self.repository.catalog.get_book(id).await.inspect_err(AppError::log)
    }

    pub async fn get_author(&self, id: i64) -> AppResult<Author> {
        self.repository.catalog.get_author(id).await.inspect_err(AppError::log)
    }

    /// List books with their authors
    pub async fn list_books(&self, params: &ListParams) -> AppResult<Page<Book>> {
        let filters = Filters::from_params(params, &BOOK_SORT, &self.listing).inspect_err(AppError::log)?;
        let (books, metadata) = self
            .repository
            .catalog
            .list_books(&filters)
            .await
            .inspect_err(AppError::log)?;
        Ok(Page::new(books, metadata))
    }

    /// List authors with their books
    pub async fn list_authors(&self, params: &ListParams) -> AppResult<Page<Author>> {
        let filters = Filters::from_params(params, &AUTHOR_SORT, &self.listing).inspect_err(AppError::log)?;
        let (authors, metadata) = self
            .repository
            .catalog
            .list_authors(&filters)
            .await
            .inspect_err(AppError::log)?;
        Ok(Page::new(authors, metadata))
    }

    /// Same page as `list_authors`, reordered by popularity (most rented first).
    /// Ranking applies within the page only.
    pub async fn list_top_rated_authors(&self, params: &ListParams) -> AppResult<Page<Author>> {
        let mut page = self.list_authors(params).await?;
        rank_by_popularity(&mut page.data);
        Ok(page)
    }

    /// Explicitly reset an author's popularity counter
    pub async fn reset_popularity(&self, author_id: i64) -> AppResult<Author> {
        let author = self
            .repository
            .catalog
            .reset_popularity(author_id)
            .await
            .inspect_err(AppError::log)?;
        tracing::info!("Reset popularity of author {}", author_id);
        Ok(author)
    }
}
