use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use unitver_common::SemanticVersion;
use uuid::Uuid;

use crate::db::{DbError, SharedStore};
use crate::error::{validate_function_unit_name, VersionValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetActiveVersionQuery {
    pub function_unit_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveVersionResponse {
    pub function_unit_name: String,
    pub version_id: Uuid,
    pub version: SemanticVersion,
    pub deployed_at: DateTime<Utc>,
    pub published_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_log: Option<String>,
    pub process_definition_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GetActiveVersionError {
    #[error(transparent)]
    Validation(#[from] VersionValidationError),

    #[error("No active version found for function unit '{0}'")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<ActiveVersionResponse, GetActiveVersionError>> for GetActiveVersionQuery {}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: SharedStore,
    query: GetActiveVersionQuery,
) -> Result<ActiveVersionResponse, GetActiveVersionError> {
    validate_function_unit_name(&query.function_unit_name)?;

    let version = store
        .get_active_version(&query.function_unit_name)
        .await?
        .ok_or_else(|| GetActiveVersionError::NotFound(query.function_unit_name.clone()))?;

    Ok(ActiveVersionResponse {
        function_unit_name: query.function_unit_name,
        version_id: version.id,
        version: version.version,
        deployed_at: version.published_at,
        published_by: version.published_by,
        change_log: version.change_log,
        process_definition_key: version.process_definition_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{deploy_sequence, memory_store};

    #[tokio::test]
    async fn test_returns_active_version() {
        let store = memory_store();
        deploy_sequence(&store, "orders", &["major", "minor"]).await;

        let active = handle(
            store,
            GetActiveVersionQuery {
                function_unit_name: "orders".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(active.version.to_string(), "1.1.0");
        assert_eq!(active.process_definition_key, "orders_v1.1.0");
    }

    #[tokio::test]
    async fn test_missing_unit() {
        let err = handle(
            memory_store(),
            GetActiveVersionQuery {
                function_unit_name: "ghost".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GetActiveVersionError::NotFound(_)));
    }
}
