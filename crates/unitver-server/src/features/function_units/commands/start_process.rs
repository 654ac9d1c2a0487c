//! Start process instance command
//!
//! Binds a new running instance to whichever version is active at that
//! instant. The binding is permanent: later deploys never move it, and only a
//! rollback that deletes the bound version removes the instance.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use unitver_common::SemanticVersion;
use uuid::Uuid;

use crate::db::SharedStore;
use crate::error::{
    validate_function_unit_name, StateError, TransactionError, VersionValidationError,
};
use crate::features::function_units::invariants;
use crate::models::NewProcessInstance;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartProcessCommand {
    /// Taken from the request path
    #[serde(default)]
    pub function_unit_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_user_id: Option<String>,

    /// Initial process variables, `{}` when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartProcessResponse {
    pub process_instance_id: Uuid,
    pub function_unit_name: String,
    pub version_id: Uuid,
    pub version: SemanticVersion,
    pub process_definition_key: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_user_id: Option<String>,
    pub variables: serde_json::Value,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartProcessError {
    #[error(transparent)]
    Validation(#[from] VersionValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl Request<Result<StartProcessResponse, StartProcessError>> for StartProcessCommand {}

impl StartProcessCommand {
    /// Operation name used in transaction errors and logs
    pub const NAME: &'static str = "process_start";

    pub fn validate(&self) -> Result<(), VersionValidationError> {
        validate_function_unit_name(&self.function_unit_name)
    }
}

#[tracing::instrument(skip(store, command), fields(function_unit = %command.function_unit_name))]
pub async fn handle(
    store: SharedStore,
    command: StartProcessCommand,
) -> Result<StartProcessResponse, StartProcessError> {
    command.validate()?;
    let name = command.function_unit_name.as_str();
    let during = TransactionError::during(StartProcessCommand::NAME);

    let mut tx = store.lock(name).await.map_err(&during)?;

    let active = tx
        .active_version()
        .await
        .map_err(&during)?
        .ok_or_else(|| StateError::NoActiveVersionFound(name.to_string()))?;

    let instance = tx
        .insert_process_instance(NewProcessInstance {
            version_id: active.id,
            process_definition_key: active.process_definition_key.clone(),
            start_user_id: command.start_user_id.clone(),
            variables: command
                .variables
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
        })
        .await
        .map_err(&during)?;

    invariants::verify_locked::<StartProcessError>(tx.as_mut(), StartProcessCommand::NAME).await?;

    tx.commit().await.map_err(&during)?;

    tracing::info!(
        function_unit = %name,
        version = %active.version,
        process_instance_id = %instance.id,
        "Process instance started"
    );

    Ok(StartProcessResponse {
        process_instance_id: instance.id,
        function_unit_name: name.to_string(),
        version_id: active.id,
        version: active.version,
        process_definition_key: instance.process_definition_key,
        status: instance.status,
        start_user_id: instance.start_user_id,
        variables: instance.variables,
        started_at: instance.started_at,
    })
}
