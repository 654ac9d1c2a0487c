//! Version history query
//!
//! Newest first, one entry per retained version, with the number of process
//! instances still bound to it. `can_rollback` is false only for the active
//! entry.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use unitver_common::SemanticVersion;
use uuid::Uuid;

use crate::db::{DbError, SharedStore};
use crate::error::{validate_function_unit_name, VersionValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionHistoryQuery {
    pub function_unit_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionHistoryEntry {
    pub version_id: Uuid,
    pub version: SemanticVersion,
    pub is_active: bool,
    pub deployed_at: DateTime<Utc>,
    pub published_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_log: Option<String>,
    pub process_instance_count: i64,
    pub can_rollback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionHistoryResponse {
    pub function_unit_name: String,
    pub versions: Vec<VersionHistoryEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum VersionHistoryError {
    #[error(transparent)]
    Validation(#[from] VersionValidationError),

    #[error("Function unit '{0}' not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<VersionHistoryResponse, VersionHistoryError>> for VersionHistoryQuery {}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: SharedStore,
    query: VersionHistoryQuery,
) -> Result<VersionHistoryResponse, VersionHistoryError> {
    validate_function_unit_name(&query.function_unit_name)?;

    if store.find_function_unit(&query.function_unit_name).await?.is_none() {
        return Err(VersionHistoryError::NotFound(query.function_unit_name));
    }

    let versions = store.list_versions(&query.function_unit_name).await?;

    let mut entries = Vec::with_capacity(versions.len());
    for version in versions {
        let process_instance_count = store.count_process_instances(version.id).await?;
        entries.push(VersionHistoryEntry {
            version_id: version.id,
            version: version.version,
            is_active: version.is_active,
            deployed_at: version.published_at,
            published_by: version.published_by,
            change_log: version.change_log,
            process_instance_count,
            can_rollback: !version.is_active,
        });
    }

    Ok(VersionHistoryResponse {
        function_unit_name: query.function_unit_name,
        versions: entries,
    })
}
