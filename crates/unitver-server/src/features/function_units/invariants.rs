//! Internal-consistency assertions over one function unit
//!
//! These are defect detectors, not business validation. Commands run
//! [`verify_locked`] after mutating and before committing, so a violation
//! aborts the transaction instead of publishing corrupt state.

use std::collections::HashSet;

use uuid::Uuid;

use crate::db::UnitTransaction;
use crate::error::{StateError, TransactionError};
use crate::models::{ProcessBinding, Version};

/// Every violation found, in a stable order: active-version count first,
/// then bindings in the order given
pub fn check(function_unit: &str, versions: &[Version], bindings: &[ProcessBinding]) -> Vec<StateError> {
    let mut violations = Vec::new();

    match versions.iter().filter(|v| v.is_active).count() {
        1 => {},
        0 => violations.push(StateError::NoActiveVersionFound(function_unit.to_string())),
        count => violations.push(StateError::SingleActiveVersionViolation {
            count,
            function_unit: function_unit.to_string(),
        }),
    }

    let known: HashSet<Uuid> = versions.iter().map(|v| v.id).collect();
    violations.extend(
        bindings
            .iter()
            .filter(|b| !known.contains(&b.version_id))
            .map(|b| StateError::ProcessBindingInvalid {
                process_instance_id: b.process_instance_id,
                version_id: b.version_id,
            }),
    );

    violations
}

/// First violation, if any
pub fn ensure(
    function_unit: &str,
    versions: &[Version],
    bindings: &[ProcessBinding],
) -> Result<(), StateError> {
    match check(function_unit, versions, bindings).into_iter().next() {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}

/// Assert the invariants against the uncommitted state of a locked unit
pub async fn verify_locked<E>(tx: &mut dyn UnitTransaction, operation: &'static str) -> Result<(), E>
where
    E: From<StateError> + From<TransactionError>,
{
    let during = TransactionError::during(operation);
    let versions = tx.list_versions().await.map_err(&during)?;
    let bindings = tx.process_bindings().await.map_err(&during)?;
    let function_unit = tx.function_unit().name.clone();

    ensure(&function_unit, &versions, &bindings).map_err(|violation| {
        tracing::error!(
            function_unit = %function_unit,
            operation,
            reason = violation.code(),
            error = %violation,
            "Invariant violated, aborting transaction"
        );
        E::from(violation)
    })
}
