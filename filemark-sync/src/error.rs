//! Sync error types and the report handed back to callers.

use filemark_storage::StorageError;
use filemark_types::CodecError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Sync disabled or unconfigured. Not a fault.
    #[error("{0}")]
    Declined(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("a sync is already in progress")]
    Busy,

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Transport(e.to_string())
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::Task(e.to_string())
    }
}

/// Coarse failure tag carried by a [`SyncReport`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncFailureKind {
    Declined,
    InvalidConfig,
    Transport,
    Storage,
    Busy,
    Internal,
}

impl SyncError {
    pub fn kind(&self) -> SyncFailureKind {
        match self {
            SyncError::Declined(_) => SyncFailureKind::Declined,
            SyncError::InvalidConfig(_) => SyncFailureKind::InvalidConfig,
            SyncError::Transport(_) => SyncFailureKind::Transport,
            SyncError::Storage(_) => SyncFailureKind::Storage,
            SyncError::Busy => SyncFailureKind::Busy,
            SyncError::Codec(_) | SyncError::Serialization(_) | SyncError::Task(_) => {
                SyncFailureKind::Internal
            }
        }
    }
}

/// Outcome of one sync attempt: `(success, message)` plus the failure tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncReport {
    pub success: bool,
    pub message: Option<String>,
    pub kind: Option<SyncFailureKind>,
}

impl SyncReport {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            message: None,
            kind: None,
        }
    }

    pub fn failed(error: &SyncError) -> Self {
        Self {
            success: false,
            message: Some(error.to_string()),
            kind: Some(error.kind()),
        }
    }

    pub fn is_declined(&self) -> bool {
        self.kind == Some(SyncFailureKind::Declined)
    }
}

impl From<&SyncResult<()>> for SyncReport {
    fn from(result: &SyncResult<()>) -> Self {
        match result {
            Ok(()) => SyncReport::succeeded(),
            Err(e) => SyncReport::failed(e),
        }
    }
}
