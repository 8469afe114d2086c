//! Backup error types.

use thiserror::Error;

/// Result type for backup operations.
pub type BackupResult<T> = Result<T, BackupError>;

/// Errors that can occur during backup operations.
#[derive(Debug, Error)]
pub enum BackupError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path is absolute outside the repository or climbs out of it.
    #[error("Invalid backup path: {0}")]
    InvalidPath(String),

    /// Operation failed.
    #[error("Backup operation failed: {0}")]
    OperationFailed(String),
}

impl BackupError {
    /// Create an invalid path error.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath(message.into())
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::OperationFailed(message.into())
    }
}
