//! Data models for the lending core

pub mod author;
pub mod book;
pub mod filters;
pub mod rental;
pub mod user;

// Re-export commonly used types
pub use author::Author;
pub use book::{AuthorRef, Book};
pub use filters::{Filters, ListParams, Metadata, Page};
pub use rental::Rental;
pub use user::User;
