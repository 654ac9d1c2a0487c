//! Rollback planning query
//!
//! Read-only. A target that does not exist or is already active is a normal
//! planning outcome (`can_proceed = false` with an `error_message`), not an
//! error.

use mediator::Request;
use serde::{Deserialize, Serialize};
use unitver_common::SemanticVersion;

use crate::db::{DbError, SharedStore};
use crate::error::{validate_function_unit_name, VersionValidationError};
use crate::features::function_units::impact::{self, RollbackImpact};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRollbackQuery {
    #[serde(default)]
    pub function_unit_name: String,
    pub target_version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PlanRollbackError {
    #[error(transparent)]
    Validation(#[from] VersionValidationError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<RollbackImpact, PlanRollbackError>> for PlanRollbackQuery {}

impl PlanRollbackQuery {
    pub fn validate(&self) -> Result<SemanticVersion, VersionValidationError> {
        validate_function_unit_name(&self.function_unit_name)?;
        Ok(SemanticVersion::parse(&self.target_version)?)
    }
}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: SharedStore,
    query: PlanRollbackQuery,
) -> Result<RollbackImpact, PlanRollbackError> {
    let target = query.validate()?;

    let (_, impact) = impact::plan(store.as_ref(), &query.function_unit_name, target).await?;

    tracing::debug!(
        can_proceed = impact.can_proceed,
        versions_to_delete = impact.versions_to_delete.len(),
        process_instances_to_delete = impact.total_process_instances_to_delete,
        "Rollback planned"
    );

    Ok(impact)
}
