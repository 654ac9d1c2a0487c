//! Error taxonomy of the versioning engine
//!
//! - [`VersionValidationError`]: the caller's input is wrong. Detected before
//!   any lock is taken (except for checks that need the locked state) and
//!   never retried.
//! - [`StateError`]: an internal invariant is broken. Only ever produced by
//!   the invariant checker; aborts the transaction and should alert.
//! - [`TransactionError`]: infrastructure failure during a read-modify-write,
//!   eligible for caller-side retry.

use serde_json::{json, Value};
use thiserror::Error;
use unitver_common::{SemanticVersion, UnitverError};
use uuid::Uuid;

use crate::db::DbError;

/// Longest accepted function-unit name
pub const MAX_FUNCTION_UNIT_NAME_LEN: usize = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionValidationError {
    #[error("Invalid semantic version format: '{0}'. Expected format: MAJOR.MINOR.PATCH")]
    InvalidVersionFormat(String),

    #[error("Version '{version}' already exists for function unit '{function_unit}'")]
    DuplicateVersion {
        version: SemanticVersion,
        function_unit: String,
    },

    #[error("Invalid change type: '{0}'. Must be 'major', 'minor', or 'patch'")]
    InvalidChangeType(String),

    #[error("Function unit name cannot be null or empty")]
    EmptyFunctionUnitName,

    #[error(
        "Invalid function unit name: '{0}'. Use at most 100 letters, digits, '_' or '-'"
    )]
    InvalidFunctionUnitName(String),

    #[error("Version '{version}' not found for function unit '{function_unit}'")]
    RollbackVersionNotFound {
        version: SemanticVersion,
        function_unit: String,
    },

    #[error("Version '{0}' is already active, cannot rollback to it")]
    RollbackToActiveVersion(SemanticVersion),

    #[error("Snapshot is {size} bytes, exceeding the {max} byte limit")]
    SnapshotTooLarge { size: usize, max: usize },

    #[error("Snapshot must be base64 encoded: {0}")]
    InvalidSnapshotEncoding(String),
}

impl VersionValidationError {
    /// Machine-readable reason, stable across message wording changes
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidVersionFormat(_) => "invalid_version_format",
            Self::DuplicateVersion { .. } => "duplicate_version",
            Self::InvalidChangeType(_) => "invalid_change_type",
            Self::EmptyFunctionUnitName => "empty_function_unit_name",
            Self::InvalidFunctionUnitName(_) => "invalid_function_unit_name",
            Self::RollbackVersionNotFound { .. } => "rollback_version_not_found",
            Self::RollbackToActiveVersion(_) => "rollback_to_active_version",
            Self::SnapshotTooLarge { .. } => "snapshot_too_large",
            Self::InvalidSnapshotEncoding(_) => "invalid_snapshot_encoding",
        }
    }

    /// `{reason, field, value, constraint}` for the error response body
    pub fn details(&self) -> Value {
        let (field, value, constraint) = match self {
            Self::InvalidVersionFormat(v) => ("version", v.clone(), "MAJOR.MINOR.PATCH"),
            Self::DuplicateVersion { version, .. } => ("version", version.to_string(), "unique"),
            Self::InvalidChangeType(t) => ("change_type", t.clone(), "major|minor|patch"),
            Self::EmptyFunctionUnitName => ("function_unit_name", String::new(), "not_empty"),
            Self::InvalidFunctionUnitName(n) => {
                ("function_unit_name", n.clone(), "^[A-Za-z0-9_-]{1,100}$")
            },
            Self::RollbackVersionNotFound { version, .. } => {
                ("target_version", version.to_string(), "exists")
            },
            Self::RollbackToActiveVersion(v) => ("target_version", v.to_string(), "not_active"),
            Self::SnapshotTooLarge { size, max } => {
                return json!({
                    "reason": self.code(),
                    "field": "snapshot",
                    "value": size,
                    "constraint": format!("max {} bytes", max),
                });
            },
            Self::InvalidSnapshotEncoding(_) => ("snapshot", String::new(), "base64"),
        };

        json!({
            "reason": self.code(),
            "field": field,
            "value": value,
            "constraint": constraint,
        })
    }
}

impl From<UnitverError> for VersionValidationError {
    fn from(err: UnitverError) -> Self {
        match err {
            UnitverError::InvalidVersion(v) => Self::InvalidVersionFormat(v),
            UnitverError::InvalidChangeType(t) => Self::InvalidChangeType(t),
            UnitverError::InvalidEncoding(e) => Self::InvalidSnapshotEncoding(e),
        }
    }
}

/// Validate a function-unit name
///
/// # Rules
/// - Must not be empty after trimming whitespace
/// - At most [`MAX_FUNCTION_UNIT_NAME_LEN`] characters
/// - Only ASCII letters, digits, `_` and `-`
pub fn validate_function_unit_name(name: &str) -> Result<(), VersionValidationError> {
    if name.trim().is_empty() {
        return Err(VersionValidationError::EmptyFunctionUnitName);
    }

    if name.len() > MAX_FUNCTION_UNIT_NAME_LEN
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(VersionValidationError::InvalidFunctionUnitName(
            name.to_string(),
        ));
    }

    Ok(())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Found {count} active versions for function unit '{function_unit}', expected exactly 1")]
    SingleActiveVersionViolation { count: usize, function_unit: String },

    #[error("No active version found for function unit '{0}'")]
    NoActiveVersionFound(String),

    #[error("Process instance '{process_instance_id}' is bound to non-existent version ID {version_id}")]
    ProcessBindingInvalid {
        process_instance_id: Uuid,
        version_id: Uuid,
    },
}

impl StateError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SingleActiveVersionViolation { .. } => "single_active_version_violation",
            Self::NoActiveVersionFound(_) => "no_active_version_found",
            Self::ProcessBindingInvalid { .. } => "process_binding_invalid",
        }
    }

    pub fn details(&self) -> Value {
        match self {
            Self::SingleActiveVersionViolation {
                count,
                function_unit,
            } => json!({
                "reason": self.code(),
                "function_unit_name": function_unit,
                "active_versions": count,
            }),
            Self::NoActiveVersionFound(function_unit) => json!({
                "reason": self.code(),
                "function_unit_name": function_unit,
            }),
            Self::ProcessBindingInvalid {
                process_instance_id,
                version_id,
            } => json!({
                "reason": self.code(),
                "process_instance_id": process_instance_id,
                "version_id": version_id,
            }),
        }
    }
}

/// Persistence failure inside a named versioning operation
#[derive(Debug, Error)]
#[error("Transaction failed during {operation}: {source}")]
pub struct TransactionError {
    pub operation: &'static str,
    #[source]
    pub source: DbError,
}

impl TransactionError {
    pub fn new(operation: &'static str, source: DbError) -> Self {
        Self { operation, source }
    }

    /// Adapter for `map_err` inside an operation
    pub fn during(operation: &'static str) -> impl Fn(DbError) -> Self {
        move |source| Self::new(operation, source)
    }

    pub fn is_lock_timeout(&self) -> bool {
        matches!(self.source, DbError::LockTimeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_function_unit_name() {
        assert!(validate_function_unit_name("leave_request-v2").is_ok());
        assert_eq!(
            validate_function_unit_name("   "),
            Err(VersionValidationError::EmptyFunctionUnitName)
        );
        assert_eq!(
            validate_function_unit_name(""),
            Err(VersionValidationError::EmptyFunctionUnitName)
        );
        assert!(matches!(
            validate_function_unit_name("has space"),
            Err(VersionValidationError::InvalidFunctionUnitName(_))
        ));
        assert!(matches!(
            validate_function_unit_name(&"a".repeat(101)),
            Err(VersionValidationError::InvalidFunctionUnitName(_))
        ));
        assert!(validate_function_unit_name(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn test_messages() {
        let duplicate = VersionValidationError::DuplicateVersion {
            version: SemanticVersion::new(1, 1, 0),
            function_unit: "orders".to_string(),
        };
        assert_eq!(
            duplicate.to_string(),
            "Version '1.1.0' already exists for function unit 'orders'"
        );

        let active = VersionValidationError::RollbackToActiveVersion(SemanticVersion::new(1, 2, 0));
        assert_eq!(
            active.to_string(),
            "Version '1.2.0' is already active, cannot rollback to it"
        );

        let state = StateError::SingleActiveVersionViolation {
            count: 2,
            function_unit: "orders".to_string(),
        };
        assert_eq!(
            state.to_string(),
            "Found 2 active versions for function unit 'orders', expected exactly 1"
        );
    }

    #[test]
    fn test_details_carry_field_and_constraint() {
        let details = VersionValidationError::InvalidChangeType("MAJOR".to_string()).details();
        assert_eq!(details["reason"], "invalid_change_type");
        assert_eq!(details["field"], "change_type");
        assert_eq!(details["value"], "MAJOR");

        let details = VersionValidationError::SnapshotTooLarge { size: 11, max: 10 }.details();
        assert_eq!(details["value"], 11);
    }

    #[test]
    fn test_common_errors_convert() {
        let err: VersionValidationError =
            unitver_common::UnitverError::InvalidVersion("v1".to_string()).into();
        assert_eq!(err, VersionValidationError::InvalidVersionFormat("v1".to_string()));
    }

    #[test]
    fn test_transaction_error_names_operation() {
        let err = TransactionError::new("deployment", DbError::LockTimeout("orders".to_string()));
        assert!(err.is_lock_timeout());
        assert!(err.to_string().starts_with("Transaction failed during deployment"));
    }
}
