//! Codec error types.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while decoding stored or transferred records.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::MalformedRecord(err.to_string())
    }
}
