use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::db::{DbError, SharedStore};
use crate::models::FunctionUnitSummary;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFunctionUnitsQuery {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFunctionUnitsResponse {
    pub function_units: Vec<FunctionUnitSummary>,
    pub total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ListFunctionUnitsError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl Request<Result<ListFunctionUnitsResponse, ListFunctionUnitsError>> for ListFunctionUnitsQuery {}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: SharedStore,
    _query: ListFunctionUnitsQuery,
) -> Result<ListFunctionUnitsResponse, ListFunctionUnitsError> {
    let function_units = store.list_function_units().await?;

    Ok(ListFunctionUnitsResponse {
        total: function_units.len(),
        function_units,
    })
}
