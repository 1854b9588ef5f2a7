//! Business logic services

pub mod catalog;
pub mod lending;
pub mod password;
pub mod users;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub lending: lending::LendingService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let hasher = password::PasswordHasher::new(&config.password)?;

        Ok(Self {
            catalog: catalog::CatalogService::new(repository.clone(), config.listing.clone()),
            lending: lending::LendingService::new(repository.clone()),
            users: users::UsersService::new(repository, hasher, config.listing.clone()),
        })
    }
}
