//! Users repository for database operations

use sqlx::{error::ErrorKind, Pool, Postgres};

use crate::{
    error::{constraint_violation, AppError, AppResult, Resource},
    models::{
        filters::{Filters, Metadata},
        user::{User, UserPageRow},
    },
};

use super::lending::rented_books;

const USER_COLUMNS: &str =
    "u.id, u.name, u.email, u.password_hash, u.deleted, u.version, u.created_at";

/// Values written by an update; the caller has already merged and validated them
pub struct UserRecord<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID. Soft-deleted users are not found.
    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1 AND u.deleted = false");

        let mut user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound(Resource::User))?;

        user.rented_books = rented_books(&self.pool, user.id).await?;
        Ok(user)
    }

    /// Get user by email (case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE LOWER(u.email) = LOWER($1) AND u.deleted = false"
        );

        let mut user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound(Resource::User))?;

        user.rented_books = rented_books(&self.pool, user.id).await?;
        Ok(user)
    }

    /// Create a new user
    pub async fn create(&self, name: &str, email: &str, password_hash: &str) -> AppResult<User> {
        let query = format!(
            r#"
            INSERT INTO users AS u (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(email_conflict)
    }

    /// Write `record` if the stored version still equals `expected_version`.
    /// Returns the new version.
    pub async fn update(&self, id: i64, record: &UserRecord<'_>, expected_version: i32) -> AppResult<i32> {
        let version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, version = version + 1
            WHERE id = $4 AND version = $5 AND deleted = false
            RETURNING version
            "#,
        )
        .bind(record.name)
        .bind(record.email)
        .bind(record.password_hash)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(email_conflict)?;

        version.ok_or(AppError::EditConflict)
    }

    /// Soft delete a user
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let affected = sqlx::query(
            "UPDATE users SET deleted = true, version = version + 1 WHERE id = $1 AND deleted = false",
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(AppError::NotFound(Resource::User));
        }
        Ok(())
    }

    /// One page of active users, each with the books they currently hold
    pub async fn list(&self, filters: &Filters) -> AppResult<(Vec<User>, Metadata)> {
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records, {USER_COLUMNS}
            FROM users u
            WHERE u.deleted = false
            ORDER BY {}
            LIMIT $1 OFFSET $2
            "#,
            filters.order_by("u.id")
        );

        let rows = sqlx::query_as::<_, UserPageRow>(&query)
            .bind(filters.limit())
            .bind(filters.offset())
            .fetch_all(&self.pool)
            .await?;

        let total = match rows.first() {
            Some(row) => row.total_records,
            None if filters.offset() > 0 => {
                sqlx::query_scalar::<_, i64>("SELECT count(*) FROM users WHERE deleted = false")
                    .fetch_one(&self.pool)
                    .await?
            }
            None => 0,
        };

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let mut user = row.user;
            user.rented_books = rented_books(&self.pool, user.id).await?;
            users.push(user);
        }

        Ok((users, filters.metadata(total)))
    }
}

fn email_conflict(err: sqlx::Error) -> AppError {
    match constraint_violation(&err) {
        Some((ErrorKind::UniqueViolation, _)) => AppError::DuplicateEmail,
        _ => AppError::from(err),
    }
}
