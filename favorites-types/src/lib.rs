//! Core type definitions for favorites sync.
//!
//! This crate defines the small set of types shared by the sync engine,
//! the HTTP gateway and the reference API server:
//! - User, entity and request identifiers
//! - The closed set of favorite categories
//! - The JSON body the favorites API returns for a category
//!
//! Listing models (items, housing, roommates) are not defined here; the
//! favorites core only ever sees opaque identifiers.

mod category;
mod ids;
mod wire;

pub use category::Category;
pub use ids::{EntityId, RequestId, UserId};
pub use wire::FavoriteIds;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unknown favorite category: {0}")]
    UnknownCategory(String),

    #[error("identifier must not be empty")]
    EmptyId,

    #[error("invalid UUID: {0}")]
    InvalidUuid(String),
}

impl From<uuid::Error> for Error {
    fn from(e: uuid::Error) -> Self {
        Error::InvalidUuid(e.to_string())
    }
}
