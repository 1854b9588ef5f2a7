//! Shared fixtures for database-backed tests.
//!
//! Tests using these run under `#[sqlx::test]`, which needs `DATABASE_URL`
//! pointing at a Postgres server; they are ignored by default.
//! Run with: cargo test -- --ignored

#![allow(dead_code)]

use library_lending::{
    config::{AppConfig, PasswordConfig},
    models::{
        author::CreateAuthor,
        book::CreateBook,
        user::CreateUser,
        Author, Book, User,
    },
    repository::Repository,
    AppState,
};
use sqlx::PgPool;

pub fn state(pool: PgPool) -> AppState {
    let mut config = AppConfig::default();
    config.password = PasswordConfig {
        memory_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    };
    let repository = Repository::new(pool, config.database.transaction_timeout());
    AppState::new(config, repository).expect("Failed to build state")
}

pub async fn author(state: &AppState, name: &str) -> Author {
    state
        .services
        .catalog
        .create_author(CreateAuthor { name: name.to_string() })
        .await
        .expect("Failed to create author")
}

pub async fn book(state: &AppState, author_id: i64, title: &str) -> Book {
    state
        .services
        .catalog
        .create_book(CreateBook {
            title: title.to_string(),
            year: 1970,
            author_id,
        })
        .await
        .expect("Failed to create book")
}

pub async fn user(state: &AppState, name: &str) -> User {
    state
        .services
        .users
        .create_user(CreateUser {
            name: name.to_string(),
            email: format!("{}@example.org", name.to_lowercase()),
            password: "correct horse battery".to_string(),
        })
        .await
        .expect("Failed to create user")
}

pub async fn popularity(state: &AppState, author_id: i64) -> i64 {
    state
        .services
        .catalog
        .get_author(author_id)
        .await
        .expect("Failed to load author")
        .popularity
}

pub async fn rental_count(pool: &PgPool, book_id: i64) -> i64 {
    sqlx::query_scalar("SELECT count(*) FROM rentals WHERE book_id = $1")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count rentals")
}
