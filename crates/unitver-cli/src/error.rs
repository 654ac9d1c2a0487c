//! Error types for the unitver CLI
//!
//! Messages are user-facing and say what to try next.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// The server answered with an error envelope
    #[error("{message} ({code})")]
    Api { code: String, message: String },

    /// Argument rejected before any request was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Response body did not match the expected shape
    #[error("Unexpected server response: {0}. Check that --server-url points at a unitver server.")]
    UnexpectedResponse(String),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and paths.")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("Network request failed: {0}. Ensure the unitver server is running and reachable.")]
    Http(#[from] reqwest::Error),

    /// JSON encoding failed
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Interactive prompt could not be shown
    #[error("Prompt failed: {0}. Use --yes to skip confirmation in non-interactive shells.")]
    Prompt(#[from] inquire::InquireError),
}

impl CliError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<unitver_common::UnitverError> for CliError {
    fn from(err: unitver_common::UnitverError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = CliError::api("VALIDATION_ERROR", "Cannot rollback to the active version");
        assert_eq!(
            err.to_string(),
            "Cannot rollback to the active version (VALIDATION_ERROR)"
        );
    }

    #[test]
    fn test_common_error_is_invalid_argument() {
        let err: CliError = unitver_common::SemanticVersion::parse("1.2").unwrap_err().into();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }
}
