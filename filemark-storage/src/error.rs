//! Storage error types.

use filemark_types::CodecError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while persisting or loading local state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("key-value backend error: {0}")]
    Backend(String),
}
