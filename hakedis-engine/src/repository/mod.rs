//! Repository Module
//!
//! Storage seams for the catalog (groups and income records) and for
//! settlement snapshots. Lookups return a typed `NotFound` or a typed empty
//! collection, never an ambiguous "missing vs. empty" signal.

pub mod catalog;
pub mod settlement;

// Re-exports
pub use catalog::{CatalogRepository, InMemoryCatalog};
pub use settlement::{InMemorySettlementRepository, SettlementRepository};

use shared::{AppError, ErrorCode};
use thiserror::Error;

/// Repository error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Write would modify a finalized snapshot
    #[error("Immutable: {0}")]
    Immutable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::with_message(ErrorCode::NotFound, msg),
            RepoError::Duplicate(msg) => AppError::with_message(ErrorCode::AlreadyExists, msg),
            RepoError::Immutable(msg) => {
                AppError::with_message(ErrorCode::SettlementAlreadyFinalized, msg)
            }
            RepoError::Storage(msg) => AppError::storage(msg),
            RepoError::Validation(msg) => AppError::validation(msg),
        }
    }
}
