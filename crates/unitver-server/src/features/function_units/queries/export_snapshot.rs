use mediator::Request;
use serde::{Deserialize, Serialize};
use unitver_common::{snapshot, SemanticVersion};
use uuid::Uuid;

use crate::db::{DbError, SharedStore};
use crate::error::{validate_function_unit_name, VersionValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSnapshotQuery {
    pub function_unit_name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSnapshotResponse {
    pub function_unit_name: String,
    pub version_id: Uuid,
    pub version: SemanticVersion,
    /// Base64 of the stored blob
    pub snapshot: String,
    pub size_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportSnapshotError {
    #[error(transparent)]
    Validation(#[from] VersionValidationError),

    #[error("Version '{version}' not found for function unit '{function_unit}'")]
    NotFound {
        version: SemanticVersion,
        function_unit: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<ExportSnapshotResponse, ExportSnapshotError>> for ExportSnapshotQuery {}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: SharedStore,
    query: ExportSnapshotQuery,
) -> Result<ExportSnapshotResponse, ExportSnapshotError> {
    validate_function_unit_name(&query.function_unit_name)?;
    let number = SemanticVersion::parse(&query.version).map_err(VersionValidationError::from)?;

    let version = store
        .find_version(&query.function_unit_name, &number)
        .await?
        .ok_or_else(|| ExportSnapshotError::NotFound {
            version: number,
            function_unit: query.function_unit_name.clone(),
        })?;

    Ok(ExportSnapshotResponse {
        function_unit_name: query.function_unit_name,
        version_id: version.id,
        version: version.version,
        snapshot: snapshot::encode(&version.snapshot),
        size_bytes: version.snapshot.len(),
    })
}
