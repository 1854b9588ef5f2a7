//! User management service

use validator::Validate;

use crate::{
    config::ListingConfig,
    error::{AppError, AppResult},
    models::{
        filters::{Filters, ListParams, Page, USER_SORT},
        user::{CreateUser, UpdateUser, User},
    },
    repository::{users::UserRecord, Repository},
};

use super::password::PasswordHasher;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    hasher: PasswordHasher,
    listing: ListingConfig,
}

impl UsersService {
    pub fn new(repository: Repository, hasher: PasswordHasher, listing: ListingConfig) -> Self {
        Self {
            repository,
            hasher,
            listing,
        }
    }

    /// Register a user; the password is stored only as a salted hash
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate().map_err(AppError::from).inspect_err(AppError::log)?;

        let email = normalize_email(&user.email);
        let password_hash = self.hash_password(user.password).await?;

        let created = self
            .repository
            .users
            .create(user.name.trim(), &email, &password_hash)
            .await
            .inspect_err(AppError::log)?;
        tracing::info!("Created user {}", created.id);
        Ok(created)
    }

    pub async fn get_user(&self, id: i64) -> AppResult<User> {
        self.repository.users.get_by_id(id).await.inspect_err(AppError::log)
    }

    pub async fn get_user_by_email(&self, email: &str) -> AppResult<User> {
        self.repository
            .users
            .get_by_email(&normalize_email(email))
            .await
            .inspect_err(AppError::log)
    }

    /// Apply a partial update. Fails with `EditConflict` when the user changed
    /// since the caller read `changes.version`.
    pub async fn update_user(&self, id: i64, changes: UpdateUser) -> AppResult<User> {
        changes.validate().map_err(AppError::from).inspect_err(AppError::log)?;

        let current = self.repository.users.get_by_id(id).await.inspect_err(AppError::log)?;
        if current.version != changes.version {
            tracing::warn!(
                "Stale update for user {}: version {} != {}",
                id,
                changes.version,
                current.version
            );
            return Err(AppError::EditConflict);
        }

        let name = changes
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&current.name)
            .to_string();
        let email = changes
            .email
            .as_deref()
            .map(normalize_email)
            .unwrap_or_else(|| current.email.clone());
        let password_hash = match changes.password {
            Some(password) => self.hash_password(password).await?,
            None => current.password_hash.clone(),
        };

        let record = UserRecord {
            name: &name,
            email: &email,
            password_hash: &password_hash,
        };
        let version = self
            .repository
            .users
            .update(id, &record, changes.version)
            .await
            .inspect_err(|e| {
                if matches!(e, AppError::EditConflict) {
                    tracing::warn!("Concurrent update won for user {}", id);
                }
                e.log();
            })?;
        tracing::info!("Updated user {} to version {}", id, version);

        self.repository.users.get_by_id(id).await.inspect_err(AppError::log)
    }

    /// Soft delete a user
    pub async fn delete_user(&self, id: i64) -> AppResult<()> {
        self.repository.users.delete(id).await.inspect_err(AppError::log)?;
        tracing::info!("Deleted user {}", id);
        Ok(())
    }

    /// List active users with the books they currently hold
    pub async fn list_users(&self, params: &ListParams) -> AppResult<Page<User>> {
        let filters = Filters::from_params(params, &USER_SORT, &self.listing).inspect_err(AppError::log)?;
        let (users, metadata) = self
            .repository
            .users
            .list(&filters)
            .await
            .inspect_err(AppError::log)?;
        Ok(Page::new(users, metadata))
    }

    /// Check a plaintext password against the user's stored hash
    pub async fn verify_password(&self, user: &User, plaintext: &str) -> AppResult<bool> {
        let hasher = self.hasher.clone();
        let digest = user.password_hash.clone();
        let plaintext = plaintext.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .map_err(|e| AppError::Internal(format!("Password task failed: {}", e)))
            .and_then(|verified| verified)
            .inspect_err(AppError::log)
    }

    // Runs on the blocking pool
    async fn hash_password(&self, plaintext: String) -> AppResult<String> {
        let hasher = self.hasher.clone();

        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| AppError::Internal(format!("Password task failed: {}", e)))
            .and_then(|hashed| hashed)
            .inspect_err(AppError::log)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
