//! Repository layer for database operations

pub mod catalog;
pub mod lending;
pub mod users;

use std::future::Future;
use std::time::Duration;

use sqlx::{Pool, Postgres, Transaction};

use crate::error::{AppError, AppResult};

/// Main repository struct; every sub-repository shares one connection pool
#[derive(Clone)]
pub struct Repository {
    pub catalog: catalog::CatalogRepository,
    pub lending: lending::LendingRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool.
    /// `transaction_timeout` bounds every multi-statement mutation.
    pub fn new(pool: Pool<Postgres>, transaction_timeout: Duration) -> Self {
        Self {
            catalog: catalog::CatalogRepository::new(pool.clone(), transaction_timeout),
            lending: lending::LendingRepository::new(pool.clone(), transaction_timeout),
            users: users::UsersRepository::new(pool),
        }
    }
}

/// Open a transaction whose statements the server cancels after `timeout`
pub(crate) async fn begin_bounded(
    pool: &Pool<Postgres>,
    timeout: Duration,
) -> AppResult<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;
    let statement = format!("SET LOCAL statement_timeout = {}", timeout.as_millis());
    sqlx::query(&statement).execute(&mut *tx).await?;
    Ok(tx)
}

/// Slack given to the client deadline so a blocked statement is cancelled by
/// the server's `statement_timeout` first
const DEADLINE_GRACE: Duration = Duration::from_millis(500);

/// Run `op` with a client-side deadline. On expiry the future, and with it any
/// open transaction, is dropped, which rolls the transaction back.
pub(crate) async fn with_deadline<T, F>(timeout: Duration, op: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(timeout + DEADLINE_GRACE, op).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Transaction exceeded {:?}, rolled back", timeout);
            Err(AppError::Timeout)
        }
    }
}
