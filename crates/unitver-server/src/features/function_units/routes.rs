//! Function unit API routes
//!
//! Wires the deploy/rollback commands and the read queries to axum handlers.
//!
//! # Route Structure
//!
//! - `GET /api/v1/function-units` - List function units
//! - `GET /api/v1/function-units/invariants` - Check invariants of every unit
//! - `POST /api/v1/function-units/:name/deploy` - Deploy a new version
//! - `GET /api/v1/function-units/:name/versions` - Version history
//! - `GET /api/v1/function-units/:name/versions/active` - Active version
//! - `GET /api/v1/function-units/:name/versions/:version/snapshot` - Export a snapshot
//! - `GET /api/v1/function-units/:name/rollback/plan?target_version=` - Plan a rollback
//! - `POST /api/v1/function-units/:name/rollback` - Roll back (two-phase)
//! - `POST /api/v1/function-units/:name/process-instances` - Start a process instance
//! - `GET /api/v1/function-units/:name/invariants` - Check invariants of one unit

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::error::{StateError, TransactionError, VersionValidationError};
use crate::features::shared::{retry_transactional, RetryPolicy};
use crate::features::FeatureState;

use super::commands::{
    self, DeployCommand, DeployError, RollbackCommand, RollbackError, RollbackOutcome,
    StartProcessCommand, StartProcessError,
};
use super::queries::{
    self, CheckInvariantsError, CheckInvariantsQuery, ExportSnapshotError, ExportSnapshotQuery,
    GetActiveVersionError, GetActiveVersionQuery, ListFunctionUnitsError, ListFunctionUnitsQuery,
    PlanRollbackError, PlanRollbackQuery, VersionHistoryError, VersionHistoryQuery,
};

// ============================================================================
// Router Configuration
// ============================================================================

pub fn function_units_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", get(list_function_units))
        .route("/invariants", get(check_all_invariants))
        .route("/:name/deploy", post(deploy))
        .route("/:name/versions", get(version_history))
        .route("/:name/versions/active", get(get_active_version))
        .route("/:name/versions/:version/snapshot", get(export_snapshot))
        .route("/:name/rollback/plan", get(plan_rollback))
        .route("/:name/rollback", post(rollback))
        .route("/:name/process-instances", post(start_process_instance))
        .route("/:name/invariants", get(check_invariants))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Deploy a new version
///
/// # Request Body
///
/// ```json
/// {
///   "snapshot": "eyJ0YWJsZXMiOltdfQ==",
///   "change_type": "minor",
///   "change_log": "Add approval step",
///   "published_by": "alice"
/// }
/// ```
///
/// # Response
///
/// - `201 Created` - Version deployed and active
/// - `400 Bad Request` - Validation error
/// - `500 Internal Server Error` - State or transaction error
#[tracing::instrument(skip(state, body), fields(function_unit = %name))]
async fn deploy(
    State(state): State<FeatureState>,
    Path(name): Path<String>,
    body: Result<Json<DeployCommand>, JsonRejection>,
) -> Result<Response, FunctionUnitApiError> {
    let Json(mut command) = body?;
    command.function_unit_name = name;
    let policy = RetryPolicy::from_config(&state.versioning);
    let max_snapshot_bytes = state.versioning.max_snapshot_bytes;

    let response = retry_transactional(&policy, DeployCommand::NAME, || {
        commands::deploy::handle(state.store.clone(), max_snapshot_bytes, command.clone())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))).into_response())
}

/// Roll back to an earlier version
///
/// # Request Body
///
/// ```json
/// { "target_version": "1.0.0", "confirmed": true }
/// ```
///
/// # Response
///
/// - `200 OK` - Rolled back, or `CONFIRMATION_REQUIRED` with the impact in
///   `error.details` when `confirmed` is false
/// - `400 Bad Request` - Malformed, missing or already active target
/// - `500 Internal Server Error` - State or transaction error
#[tracing::instrument(skip(state, body), fields(function_unit = %name))]
async fn rollback(
    State(state): State<FeatureState>,
    Path(name): Path<String>,
    body: Result<Json<RollbackCommand>, JsonRejection>,
) -> Result<Response, FunctionUnitApiError> {
    let Json(mut command) = body?;
    command.function_unit_name = name;
    let outcome = if command.confirmed {
        let policy = RetryPolicy::from_config(&state.versioning);
        retry_transactional(&policy, RollbackCommand::NAME, || {
            commands::rollback::handle(state.store.clone(), command.clone())
        })
        .await?
    } else {
        commands::rollback::handle(state.store.clone(), command).await?
    };

    match outcome {
        RollbackOutcome::Completed(response) => {
            Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
        },
        RollbackOutcome::ConfirmationRequired(impact) => {
            let message = impact.warning_message.clone().unwrap_or_default();
            let details = serde_json::to_value(&impact)
                .map_err(|e| FunctionUnitApiError::Internal(e.to_string()))?;
            Ok((
                StatusCode::OK,
                Json(ErrorResponse::with_details("CONFIRMATION_REQUIRED", message, details)),
            )
                .into_response())
        },
    }
}

/// Start a process instance bound to the active version
///
/// The body is optional; a request without a JSON content type starts the
/// instance with no user and no variables.
#[tracing::instrument(skip(state, body), fields(function_unit = %name))]
async fn start_process_instance(
    State(state): State<FeatureState>,
    Path(name): Path<String>,
    body: Result<Json<StartProcessCommand>, JsonRejection>,
) -> Result<Response, FunctionUnitApiError> {
    let mut command = match body {
        Ok(Json(command)) => command,
        Err(JsonRejection::MissingJsonContentType(_)) => StartProcessCommand::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    command.function_unit_name = name;

    let response = commands::start_process::handle(state.store.clone(), command).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(state))]
async fn list_function_units(
    State(state): State<FeatureState>,
) -> Result<Response, FunctionUnitApiError> {
    let response = queries::list::handle(state.store, ListFunctionUnitsQuery::default()).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state))]
async fn version_history(
    State(state): State<FeatureState>,
    Path(name): Path<String>,
) -> Result<Response, FunctionUnitApiError> {
    let query = VersionHistoryQuery {
        function_unit_name: name,
    };
    let response = queries::history::handle(state.store, query).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state))]
async fn get_active_version(
    State(state): State<FeatureState>,
    Path(name): Path<String>,
) -> Result<Response, FunctionUnitApiError> {
    let query = GetActiveVersionQuery {
        function_unit_name: name,
    };
    let response = queries::get_active::handle(state.store, query).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state))]
async fn export_snapshot(
    State(state): State<FeatureState>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Response, FunctionUnitApiError> {
    let query = ExportSnapshotQuery {
        function_unit_name: name,
        version,
    };
    let response = queries::export_snapshot::handle(state.store, query).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[derive(Debug, Deserialize)]
struct PlanRollbackParams {
    target_version: String,
}

#[tracing::instrument(skip(state))]
async fn plan_rollback(
    State(state): State<FeatureState>,
    Path(name): Path<String>,
    Query(params): Query<PlanRollbackParams>,
) -> Result<Response, FunctionUnitApiError> {
    let query = PlanRollbackQuery {
        function_unit_name: name,
        target_version: params.target_version,
    };
    let impact = queries::plan_rollback::handle(state.store, query).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(impact))).into_response())
}

#[tracing::instrument(skip(state))]
async fn check_invariants(
    State(state): State<FeatureState>,
    Path(name): Path<String>,
) -> Result<Response, FunctionUnitApiError> {
    let query = CheckInvariantsQuery {
        function_unit_name: Some(name),
    };
    let reports = queries::check_invariants::handle(state.store, query).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(reports))).into_response())
}

#[tracing::instrument(skip(state))]
async fn check_all_invariants(
    State(state): State<FeatureState>,
) -> Result<Response, FunctionUnitApiError> {
    let reports =
        queries::check_invariants::handle(state.store, CheckInvariantsQuery::default()).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(reports))).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Unified error type for function unit API endpoints
#[derive(Debug)]
pub enum FunctionUnitApiError {
    Validation(VersionValidationError),
    MalformedBody(String),
    NotFound(String),
    State(StateError),
    Transaction(TransactionError),
    Internal(String),
}

impl IntoResponse for FunctionUnitApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            FunctionUnitApiError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_details("VALIDATION_ERROR", e.to_string(), e.details()),
            ),
            FunctionUnitApiError::MalformedBody(msg) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new("VALIDATION_ERROR", msg))
            },
            FunctionUnitApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorResponse::new("NOT_FOUND", msg))
            },
            FunctionUnitApiError::State(e) => {
                tracing::error!(reason = e.code(), error = %e, "State error surfaced to caller");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("STATE_ERROR", e.to_string(), e.details()),
                )
            },
            FunctionUnitApiError::Transaction(e) => {
                tracing::error!(operation = e.operation, error = %e, "Transaction failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "TRANSACTION_ERROR",
                        format!("Transaction failed during {}", e.operation),
                    ),
                )
            },
            FunctionUnitApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred"),
                )
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for FunctionUnitApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

impl From<DeployError> for FunctionUnitApiError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Validation(e) => Self::Validation(e),
            DeployError::State(e) => Self::State(e),
            DeployError::Transaction(e) => Self::Transaction(e),
        }
    }
}

impl From<RollbackError> for FunctionUnitApiError {
    fn from(err: RollbackError) -> Self {
        match err {
            RollbackError::Validation(e) => Self::Validation(e),
            RollbackError::State(e) => Self::State(e),
            RollbackError::Transaction(e) => Self::Transaction(e),
        }
    }
}

impl From<StartProcessError> for FunctionUnitApiError {
    fn from(err: StartProcessError) -> Self {
        match err {
            StartProcessError::Validation(e) => Self::Validation(e),
            // Nothing to bind to: the unit was never deployed
            StartProcessError::State(e @ StateError::NoActiveVersionFound(_)) => {
                Self::NotFound(e.to_string())
            },
            StartProcessError::State(e) => Self::State(e),
            StartProcessError::Transaction(e) => Self::Transaction(e),
        }
    }
}

impl From<ListFunctionUnitsError> for FunctionUnitApiError {
    fn from(err: ListFunctionUnitsError) -> Self {
        match err {
            ListFunctionUnitsError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<VersionHistoryError> for FunctionUnitApiError {
    fn from(err: VersionHistoryError) -> Self {
        match err {
            VersionHistoryError::Validation(e) => Self::Validation(e),
            e @ VersionHistoryError::NotFound(_) => Self::NotFound(e.to_string()),
            VersionHistoryError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<GetActiveVersionError> for FunctionUnitApiError {
    fn from(err: GetActiveVersionError) -> Self {
        match err {
            GetActiveVersionError::Validation(e) => Self::Validation(e),
            e @ GetActiveVersionError::NotFound(_) => Self::NotFound(e.to_string()),
            GetActiveVersionError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<ExportSnapshotError> for FunctionUnitApiError {
    fn from(err: ExportSnapshotError) -> Self {
        match err {
            ExportSnapshotError::Validation(e) => Self::Validation(e),
            e @ ExportSnapshotError::NotFound { .. } => Self::NotFound(e.to_string()),
            ExportSnapshotError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<PlanRollbackError> for FunctionUnitApiError {
    fn from(err: PlanRollbackError) -> Self {
        match err {
            PlanRollbackError::Validation(e) => Self::Validation(e),
            PlanRollbackError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<CheckInvariantsError> for FunctionUnitApiError {
    fn from(err: CheckInvariantsError) -> Self {
        match err {
            CheckInvariantsError::Validation(e) => Self::Validation(e),
            e @ CheckInvariantsError::NotFound(_) => Self::NotFound(e.to_string()),
            CheckInvariantsError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;
    use unitver_common::SemanticVersion;

    #[test]
    fn test_status_codes() {
        let validation = FunctionUnitApiError::Validation(
            VersionValidationError::RollbackToActiveVersion(SemanticVersion::new(1, 0, 0)),
        );
        assert_eq!(validation.into_response().status(), StatusCode::BAD_REQUEST);

        let not_found = FunctionUnitApiError::from(StartProcessError::State(
            StateError::NoActiveVersionFound("orders".to_string()),
        ));
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let state = FunctionUnitApiError::from(DeployError::State(
            StateError::NoActiveVersionFound("orders".to_string()),
        ));
        assert_eq!(state.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let transaction = FunctionUnitApiError::from(RollbackError::Transaction(
            TransactionError::new("rollback", DbError::LockTimeout("orders".to_string())),
        ));
        assert_eq!(
            transaction.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
