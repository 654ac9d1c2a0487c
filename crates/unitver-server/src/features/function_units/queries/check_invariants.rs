//! On-demand invariant report
//!
//! Runs the same assertions the commands run before commit, against
//! committed state, and reports violations instead of failing the request.

use futures::future::try_join_all;
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::db::{DbError, SharedStore, VersionStore};
use crate::error::{validate_function_unit_name, VersionValidationError};
use crate::features::function_units::invariants;

/// Check one unit, or every unit when `function_unit_name` is `None`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckInvariantsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_unit_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantViolation {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantReport {
    pub function_unit_name: String,
    pub healthy: bool,
    pub violations: Vec<InvariantViolation>,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckInvariantsError {
    #[error(transparent)]
    Validation(#[from] VersionValidationError),

    #[error("Function unit '{0}' not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<Vec<InvariantReport>, CheckInvariantsError>> for CheckInvariantsQuery {}

async fn report_for(store: &dyn VersionStore, name: &str) -> Result<InvariantReport, DbError> {
    let versions = store.list_versions(name).await?;
    let bindings = store.process_bindings(name).await?;

    let violations: Vec<InvariantViolation> = invariants::check(name, &versions, &bindings)
        .into_iter()
        .map(|violation| {
            tracing::error!(
                function_unit = %name,
                reason = violation.code(),
                error = %violation,
                "Invariant violated in committed state"
            );
            InvariantViolation {
                code: violation.code().to_string(),
                message: violation.to_string(),
                details: violation.details(),
            }
        })
        .collect();

    Ok(InvariantReport {
        function_unit_name: name.to_string(),
        healthy: violations.is_empty(),
        violations,
    })
}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: SharedStore,
    query: CheckInvariantsQuery,
) -> Result<Vec<InvariantReport>, CheckInvariantsError> {
    let names = match query.function_unit_name {
        Some(name) => {
            validate_function_unit_name(&name)?;
            if store.find_function_unit(&name).await?.is_none() {
                return Err(CheckInvariantsError::NotFound(name));
            }
            vec![name]
        },
        None => store
            .list_function_units()
            .await?
            .into_iter()
            .map(|unit| unit.function_unit_name)
            .collect(),
    };

    let reports = try_join_all(names.iter().map(|name| report_for(store.as_ref(), name))).await?;

    tracing::debug!(
        units = reports.len(),
        unhealthy = reports.iter().filter(|r| !r.healthy).count(),
        "Invariant check finished"
    );

    Ok(reports)
}
