//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, UnitverError>;

/// Errors raised while parsing or decoding shared value types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitverError {
    #[error("Invalid semantic version format: '{0}'. Expected format: MAJOR.MINOR.PATCH")]
    InvalidVersion(String),

    #[error("Invalid change type: '{0}'. Must be 'major', 'minor', or 'patch'")]
    InvalidChangeType(String),

    #[error("Snapshot is not valid base64: {0}")]
    InvalidEncoding(String),
}
