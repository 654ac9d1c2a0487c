//! Deploy command
//!
//! Publishes a new immutable version of a function unit and makes it the
//! active one. The next version number is derived from the currently active
//! version and the requested change type, starting from a `0.0.0` baseline.
//!
//! # Architecture
//!
//! - Command: request data plus input validation
//! - Handler: takes the unit lock, appends, activates, checks invariants and
//!   commits in one transaction. Nothing is visible unless every step succeeds.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use unitver_common::{snapshot, ChangeType, SemanticVersion};
use uuid::Uuid;

use crate::db::{DbError, SharedStore};
use crate::error::{
    validate_function_unit_name, StateError, TransactionError, VersionValidationError,
};
use crate::features::function_units::invariants;
use crate::features::shared::Retryable;
use crate::models::{process_definition_key, NewVersion};

/// Publisher recorded when the caller does not name one
pub const DEFAULT_PUBLISHER: &str = "system";

/// Command to deploy a new version
///
/// # Examples
///
/// ```rust,ignore
/// let command = DeployCommand {
///     function_unit_name: "leave_request".to_string(),
///     snapshot: unitver_common::snapshot::encode(b"{...}"),
///     change_type: "minor".to_string(),
///     change_log: Some("Add approval step".to_string()),
///     published_by: Some("alice".to_string()),
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployCommand {
    /// Taken from the request path
    #[serde(default)]
    pub function_unit_name: String,

    /// Base64-encoded snapshot blob, stored verbatim
    pub snapshot: String,

    /// `major`, `minor` or `patch`
    pub change_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_log: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub success: bool,
    pub function_unit_name: String,
    pub version_id: Uuid,
    pub version: SemanticVersion,
    pub deployed_at: DateTime<Utc>,
    pub process_definition_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Validation(#[from] VersionValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl Retryable for DeployError {
    fn is_retryable(&self) -> bool {
        matches!(self, DeployError::Transaction(_))
    }
}

impl Request<Result<DeployResponse, DeployError>> for DeployCommand {}

impl DeployCommand {
    /// Operation name used in transaction errors and logs
    pub const NAME: &'static str = "deployment";

    /// Validate the name and change type and decode the snapshot
    ///
    /// # Errors
    ///
    /// - `EmptyFunctionUnitName` / `InvalidFunctionUnitName`
    /// - `InvalidChangeType` for anything but the exact strings
    ///   `major`, `minor` and `patch`
    /// - `InvalidSnapshotEncoding` if the snapshot is not base64
    /// - `SnapshotTooLarge` if the decoded blob exceeds `max_snapshot_bytes`
    pub fn validate(
        &self,
        max_snapshot_bytes: usize,
    ) -> Result<(ChangeType, Vec<u8>), VersionValidationError> {
        validate_function_unit_name(&self.function_unit_name)?;

        let change_type: ChangeType = self.change_type.parse()?;

        let blob = snapshot::decode(&self.snapshot)?;
        if blob.len() > max_snapshot_bytes {
            return Err(VersionValidationError::SnapshotTooLarge {
                size: blob.len(),
                max: max_snapshot_bytes,
            });
        }

        Ok((change_type, blob))
    }

    fn publisher(&self) -> String {
        self.published_by
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PUBLISHER)
            .to_string()
    }
}

/// Handler for deploying a version
///
/// # Errors
///
/// - Validation errors before the lock is taken, and `DuplicateVersion`
///   under it
/// - `StateError` if the invariant check fails before commit
/// - `TransactionError("deployment")` for any persistence failure
#[tracing::instrument(
    skip(store, command),
    fields(
        function_unit = %command.function_unit_name,
        change_type = %command.change_type
    )
)]
pub async fn handle(
    store: SharedStore,
    max_snapshot_bytes: usize,
    command: DeployCommand,
) -> Result<DeployResponse, DeployError> {
    let (change_type, blob) = command.validate(max_snapshot_bytes)?;
    let name = command.function_unit_name.as_str();
    let during = TransactionError::during(DeployCommand::NAME);

    let mut tx = store.lock(name).await.map_err(&during)?;

    let current = tx
        .active_version()
        .await
        .map_err(&during)?
        .map(|v| v.version)
        .unwrap_or(SemanticVersion::ZERO);
    let next = current.bump(change_type);

    let duplicate = || VersionValidationError::DuplicateVersion {
        version: next,
        function_unit: name.to_string(),
    };

    // Saturated increments land on an existing number
    if tx
        .list_versions()
        .await
        .map_err(&during)?
        .iter()
        .any(|v| v.version == next)
    {
        return Err(duplicate().into());
    }

    let version = tx
        .append_version(NewVersion {
            version: next,
            change_log: command.change_log.clone(),
            snapshot: blob,
            published_by: command.publisher(),
            process_definition_key: process_definition_key(name, &next),
        })
        .await
        .map_err(|e| match e {
            DbError::Duplicate(_) => DeployError::from(duplicate()),
            other => during(other).into(),
        })?;

    tx.set_active(version.id).await.map_err(&during)?;

    invariants::verify_locked::<DeployError>(tx.as_mut(), DeployCommand::NAME).await?;

    tx.commit().await.map_err(&during)?;

    tracing::info!(
        function_unit = %name,
        version = %version.version,
        version_id = %version.id,
        previous_version = %current,
        "Function unit deployed"
    );

    Ok(DeployResponse {
        success: true,
        function_unit_name: name.to_string(),
        version_id: version.id,
        version: version.version,
        deployed_at: version.published_at,
        process_definition_key: version.process_definition_key,
    })
}
