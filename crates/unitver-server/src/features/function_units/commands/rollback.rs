//! Rollback command
//!
//! Two-phase by construction: an unconfirmed call only reports the impact
//! ([`RollbackOutcome::ConfirmationRequired`]); a confirmed call deletes every
//! version newer than the target, together with the process instances bound
//! to them, and reactivates the target.

use mediator::Request;
use serde::{Deserialize, Serialize};
use unitver_common::SemanticVersion;
use uuid::Uuid;

use crate::db::SharedStore;
use crate::error::{
    validate_function_unit_name, StateError, TransactionError, VersionValidationError,
};
use crate::features::function_units::impact::{self, Assessment, RollbackImpact};
use crate::features::function_units::invariants;
use crate::features::shared::Retryable;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackCommand {
    /// Taken from the request path
    #[serde(default)]
    pub function_unit_name: String,

    pub target_version: String,

    /// Must be `true` for anything to be deleted
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResponse {
    pub success: bool,
    pub function_unit_name: String,
    pub rolled_back_to_version: SemanticVersion,
    pub rolled_back_to_version_id: Uuid,
    /// Oldest first
    pub deleted_versions: Vec<SemanticVersion>,
    pub deleted_process_count: u64,
}

#[derive(Debug, Clone)]
pub enum RollbackOutcome {
    Completed(RollbackResponse),
    /// Not an error: the caller must show the impact and call again with
    /// `confirmed = true`
    ConfirmationRequired(RollbackImpact),
}

#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error(transparent)]
    Validation(#[from] VersionValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl Retryable for RollbackError {
    fn is_retryable(&self) -> bool {
        matches!(self, RollbackError::Transaction(_))
    }
}

impl Request<Result<RollbackOutcome, RollbackError>> for RollbackCommand {}

impl RollbackCommand {
    /// Operation name used in transaction errors and logs
    pub const NAME: &'static str = "rollback";

    pub fn validate(&self) -> Result<SemanticVersion, VersionValidationError> {
        validate_function_unit_name(&self.function_unit_name)?;
        Ok(SemanticVersion::parse(&self.target_version)?)
    }
}

/// Handler for rolling back a function unit
///
/// A target that does not exist or is already active is rejected with a
/// validation error whether or not the call is confirmed. For a valid target,
/// an unconfirmed call returns the impact and mutates nothing.
///
/// The confirmed path assesses the target again under the unit lock, so a
/// deploy that raced the planning read cannot be silently deleted against a
/// stale plan.
#[tracing::instrument(
    skip(store, command),
    fields(
        function_unit = %command.function_unit_name,
        target_version = %command.target_version,
        confirmed = command.confirmed
    )
)]
pub async fn handle(
    store: SharedStore,
    command: RollbackCommand,
) -> Result<RollbackOutcome, RollbackError> {
    let target = command.validate()?;
    let name = command.function_unit_name.as_str();
    let during = TransactionError::during(RollbackCommand::NAME);

    let (assessment, impact) = impact::plan(store.as_ref(), name, target)
        .await
        .map_err(&during)?;

    if let Assessment::Rejected(reason) = assessment {
        return Err(reason.into());
    }

    if !command.confirmed {
        tracing::info!(
            function_unit = %name,
            target_version = %target,
            versions_to_delete = impact.versions_to_delete.len(),
            process_instances_to_delete = impact.total_process_instances_to_delete,
            "Rollback requires confirmation"
        );
        return Ok(RollbackOutcome::ConfirmationRequired(impact));
    }

    let mut tx = store.lock(name).await.map_err(&during)?;

    let versions = tx.list_versions().await.map_err(&during)?;
    let target_version = match impact::assess(name, versions, &target) {
        Assessment::Proceed { target, .. } => target,
        Assessment::Rejected(reason) => return Err(reason.into()),
    };

    let mut deleted = tx.delete_versions_above(&target).await.map_err(&during)?;
    tx.set_active(target_version.id).await.map_err(&during)?;

    invariants::verify_locked::<RollbackError>(tx.as_mut(), RollbackCommand::NAME).await?;

    tx.commit().await.map_err(&during)?;

    deleted.sort_by(|a, b| a.version.version.cmp(&b.version.version));
    let deleted_process_count: u64 = deleted.iter().map(|d| d.deleted_process_instances).sum();
    let deleted_versions: Vec<SemanticVersion> = deleted.iter().map(|d| d.version.version).collect();

    tracing::info!(
        function_unit = %name,
        version = %target,
        version_id = %target_version.id,
        deleted_versions = deleted_versions.len(),
        deleted_process_count,
        "Function unit rolled back"
    );

    Ok(RollbackOutcome::Completed(RollbackResponse {
        success: true,
        function_unit_name: name.to_string(),
        rolled_back_to_version: target,
        rolled_back_to_version_id: target_version.id,
        deleted_versions,
        deleted_process_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::function_units::commands;
    use crate::features::shared::test_helpers::{
        self, deploy_sequence, memory_store, start_instance, FaultyStore,
    };
    use std::sync::{atomic::Ordering, Arc};
    use unitver_common::ChangeType;

    fn rollback(name: &str, target: &str, confirmed: bool) -> RollbackCommand {
        RollbackCommand {
            function_unit_name: name.to_string(),
            target_version: target.to_string(),
            confirmed,
        }
    }

    fn versions_of(list: &[crate::models::Version]) -> Vec<String> {
        list.iter().map(|v| v.version.to_string()).collect()
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            rollback("orders", "1.0.0", true).validate().unwrap(),
            SemanticVersion::new(1, 0, 0)
        );
        assert_eq!(
            rollback("orders", "v1.0.0", true).validate().unwrap_err(),
            VersionValidationError::InvalidVersionFormat("v1.0.0".to_string())
        );
        assert_eq!(
            rollback("", "1.0.0", true).validate().unwrap_err(),
            VersionValidationError::EmptyFunctionUnitName
        );
    }

    #[tokio::test]
    async fn test_unconfirmed_rollback_mutates_nothing() {
        let store = memory_store();
        deploy_sequence(&store, "orders", &["major", "minor", "minor"]).await;
        start_instance(&store, "orders").await;
        let before = store.list_versions("orders").await.unwrap();

        let outcome = handle(store.clone(), rollback("orders", "1.0.0", false))
            .await
            .unwrap();

        match outcome {
            RollbackOutcome::ConfirmationRequired(impact) => {
                assert!(impact.can_proceed);
                assert_eq!(impact.total_process_instances_to_delete, 1);
                assert_eq!(impact.versions_to_delete.len(), 2);
            },
            other => panic!("expected ConfirmationRequired, got {:?}", other),
        }

        assert_eq!(store.list_versions("orders").await.unwrap(), before);
        assert_eq!(store.process_bindings("orders").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_confirmed_rollback_deletes_newer_versions() {
        let store = memory_store();
        deploy_sequence(&store, "orders", &["major", "minor", "minor"]).await;
        start_instance(&store, "orders").await;
        start_instance(&store, "orders").await;

        let outcome = handle(store.clone(), rollback("orders", "1.0.0", true))
            .await
            .unwrap();

        let response = match outcome {
            RollbackOutcome::Completed(response) => response,
            other => panic!("expected Completed, got {:?}", other),
        };
        assert_eq!(response.rolled_back_to_version.to_string(), "1.0.0");
        assert_eq!(
            response
                .deleted_versions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            vec!["1.1.0", "1.2.0"]
        );
        assert_eq!(response.deleted_process_count, 2);

        let versions = store.list_versions("orders").await.unwrap();
        assert_eq!(versions_of(&versions), vec!["1.0.0"]);
        assert!(versions[0].is_active);
        assert!(store.process_bindings("orders").await.unwrap().is_empty());

        let unit = store.find_function_unit("orders").await.unwrap().unwrap();
        assert_eq!(unit.current_version, Some(SemanticVersion::new(1, 0, 0)));
    }

    #[tokio::test]
    async fn test_rollback_to_active_version_is_rejected() {
        let store = memory_store();
        deploy_sequence(&store, "orders", &["major", "minor"]).await;
        let before = store.list_versions("orders").await.unwrap();

        for confirmed in [false, true] {
            let err = handle(store.clone(), rollback("orders", "1.1.0", confirmed))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                RollbackError::Validation(VersionValidationError::RollbackToActiveVersion(_))
            ));
        }
        assert_eq!(store.list_versions("orders").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_rollback_to_unknown_version_is_rejected() {
        let store = memory_store();
        deploy_sequence(&store, "orders", &["major"]).await;

        let err = handle(store.clone(), rollback("orders", "0.9.0", true))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RollbackError::Validation(VersionValidationError::RollbackVersionNotFound { .. })
        ));

        // Unknown unit: nothing is created as a side effect
        let err = handle(store.clone(), rollback("ghost", "1.0.0", true))
            .await
            .unwrap_err();
        assert!(matches!(err, RollbackError::Validation(_)));
        assert!(store.find_function_unit("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deploy_after_rollback_reuses_numbers() {
        let store = memory_store();
        deploy_sequence(&store, "orders", &["major", "minor"]).await;

        handle(store.clone(), rollback("orders", "1.0.0", true)).await.unwrap();
        let versions = deploy_sequence(&store, "orders", &["minor"]).await;

        assert_eq!(versions[0].to_string(), "1.1.0");
        let listed = store.list_versions("orders").await.unwrap();
        assert_eq!(versions_of(&listed), vec!["1.1.0", "1.0.0"]);
        assert_eq!(listed.iter().filter(|v| v.is_active).count(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_unit_untouched() {
        let faulty = Arc::new(FaultyStore::new());
        let store: SharedStore = faulty.clone();
        deploy_sequence(&store, "orders", &["major", "minor"]).await;
        let before = store.list_versions("orders").await.unwrap();

        faulty.faults.failing_commits.store(1, Ordering::SeqCst);
        let err = handle(store.clone(), rollback("orders", "1.0.0", true))
            .await
            .unwrap_err();

        match &err {
            RollbackError::Transaction(e) => assert_eq!(e.operation, "rollback"),
            other => panic!("expected TransactionError, got {:?}", other),
        }
        assert_eq!(store.list_versions("orders").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_dangling_binding_aborts_rollback() {
        let faulty = Arc::new(FaultyStore::new());
        let store: SharedStore = faulty.clone();
        deploy_sequence(&store, "orders", &["major", "minor"]).await;
        let before = store.list_versions("orders").await.unwrap();

        faulty.faults.dangling_binding.store(true, Ordering::SeqCst);
        let err = handle(store.clone(), rollback("orders", "1.0.0", true))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RollbackError::State(StateError::ProcessBindingInvalid { .. })
        ));
        assert_eq!(store.list_versions("orders").await.unwrap(), before);
    }

    // ========================================================================
    // Interleaved deploys and rollbacks
    // ========================================================================

    async fn assert_single_active_newest(store: &SharedStore, name: &str) {
        let versions = store.list_versions(name).await.unwrap();
        assert!(!versions.is_empty());
        assert_eq!(versions.iter().filter(|v| v.is_active).count(), 1);
        assert!(versions[0].is_active, "active is not the newest: {:?}", versions_of(&versions));

        let unit = store.find_function_unit(name).await.unwrap().unwrap();
        assert_eq!(unit.current_version, Some(versions[0].version));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rollback_and_deploy_race_is_serialized() {
        for _ in 0..25 {
            let store = memory_store();
            deploy_sequence(&store, "orders", &["major", "minor"]).await;

            let rolling_back = {
                let store = store.clone();
                tokio::spawn(async move { handle(store, rollback("orders", "1.0.0", true)).await })
            };
            let deploying = {
                let store = store.clone();
                tokio::spawn(async move {
                    commands::deploy::handle(store, 64 * 1024, test_helpers::command("orders", "patch"))
                        .await
                })
            };

            let outcome = rolling_back.await.unwrap().unwrap();
            let deployed = deploying.await.unwrap().unwrap();
            assert!(matches!(outcome, RollbackOutcome::Completed(_)));
            assert_single_active_newest(&store, "orders").await;

            // Either the patch landed on 1.0.0 after the rollback, or the
            // rollback removed it together with 1.1.0
            let remaining = versions_of(&store.list_versions("orders").await.unwrap());
            match deployed.version.to_string().as_str() {
                "1.0.1" => assert_eq!(remaining, vec!["1.0.1", "1.0.0"]),
                "1.1.1" => assert_eq!(remaining, vec!["1.0.0"]),
                other => panic!("unexpected deployed version {}", other),
            }
        }
    }

    #[derive(Debug, Clone)]
    enum Step {
        Deploy(ChangeType),
        Rollback(usize),
    }

    fn arb_step() -> impl proptest::strategy::Strategy<Value = Step> {
        use proptest::prelude::*;
        prop_oneof![
            prop_oneof![
                Just(ChangeType::Major),
                Just(ChangeType::Minor),
                Just(ChangeType::Patch)
            ]
            .prop_map(Step::Deploy),
            (0usize..16).prop_map(Step::Rollback),
        ]
    }

    async fn run_steps(steps: Vec<Step>) {
        let store = memory_store();
        let mut expected = deploy_sequence(&store, "orders", &["major"]).await;

        for step in steps {
            match step {
                Step::Deploy(change_type) => {
                    let current = expected.last().copied().unwrap_or_default();
                    let response = commands::deploy::handle(
                        store.clone(),
                        64 * 1024,
                        test_helpers::command("orders", change_type.as_str()),
                    )
                    .await
                    .unwrap();
                    assert_eq!(response.version, current.bump(change_type));
                    expected.push(response.version);
                },
                Step::Rollback(pick) => {
                    let older = expected.len() - 1;
                    if older == 0 {
                        let active = expected[0].to_string();
                        let err = handle(store.clone(), rollback("orders", &active, true))
                            .await
                            .unwrap_err();
                        assert!(matches!(err, RollbackError::Validation(_)));
                    } else {
                        let target = expected[pick % older];
                        let outcome = handle(store.clone(), rollback("orders", &target.to_string(), true))
                            .await
                            .unwrap();
                        let response = match outcome {
                            RollbackOutcome::Completed(response) => response,
                            other => panic!("expected Completed, got {:?}", other),
                        };
                        let kept = pick % older + 1;
                        assert_eq!(response.deleted_versions, expected[kept..].to_vec());
                        expected.truncate(kept);
                    }
                },
            }

            assert_single_active_newest(&store, "orders").await;
            let mut listed: Vec<SemanticVersion> = store
                .list_versions("orders")
                .await
                .unwrap()
                .iter()
                .map(|v| v.version)
                .collect();
            listed.reverse();
            assert_eq!(listed, expected);
        }
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(64))]

        #[test]
        fn prop_any_step_sequence_keeps_single_active_newest(
            steps in proptest::collection::vec(arb_step(), 1..40)
        ) {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(run_steps(steps));
        }
    }
}
