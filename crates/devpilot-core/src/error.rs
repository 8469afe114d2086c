//! Error types for the core crate.

use devpilot_util::ErrorKind;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A request was malformed (empty path, bad batch, unknown key).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A path would resolve outside the active repository root.
    #[error("path escapes repository root: {0}")]
    PathEscape(String),

    /// An operation needs an active repository but none has been scanned.
    #[error("no active repository - scan a repository root first")]
    NoRepo,

    /// The requested repository root does not exist or is not a directory.
    #[error("repository root not found: {0}")]
    RootNotFound(String),

    /// A requested file is not present.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backup store error.
    #[error("backup error: {0}")]
    Backup(#[from] devpilot_backup::BackupError),

    /// Settings persistence error.
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Settings-specific errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file is not valid JSON or does not have the right shape.
    #[error("invalid settings at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Could not determine where settings live.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether the error was caused by the caller's input rather than the
    /// environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidInput(_) | CoreError::PathEscape(_) | CoreError::NoRepo
        )
    }
}

impl From<devpilot_util::Error> for CoreError {
    fn from(err: devpilot_util::Error) -> Self {
        match err.kind() {
            ErrorKind::PathEscape => CoreError::PathEscape(err.message().to_string()),
            ErrorKind::NotFound => CoreError::NotFound(err.message().to_string()),
            _ => CoreError::InvalidInput(err.message().to_string()),
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
