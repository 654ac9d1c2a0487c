//! Test fixtures for engine tests
//!
//! Everything here runs against [`InMemoryVersionStore`], so no database is
//! needed. [`FaultyStore`] wraps it to inject the failures a real database
//! can produce.
//!
//! # Examples
//!
//! ```rust,ignore
//! let store = memory_store();
//! deploy_sequence(&store, "orders", &["major", "minor"]).await;
//! start_instance(&store, "orders").await;
//! ```

use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;
use unitver_common::{snapshot, SemanticVersion};
use uuid::Uuid;

use crate::db::{
    DbError, DbResult, InMemoryVersionStore, SharedStore, UnitTransaction, VersionStore,
};
use crate::features::function_units::commands::{deploy, start_process, DeployCommand};
use crate::models::{
    DeletedVersion, FunctionUnit, FunctionUnitSummary, NewProcessInstance, NewVersion,
    ProcessBinding, ProcessInstance, Version,
};

const TEST_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const TEST_MAX_SNAPSHOT_BYTES: usize = 64 * 1024;

pub fn memory_store() -> SharedStore {
    Arc::new(InMemoryVersionStore::new(TEST_LOCK_TIMEOUT))
}

/// Deploy command with a small JSON snapshot
pub fn command(name: &str, change_type: &str) -> DeployCommand {
    DeployCommand {
        function_unit_name: name.to_string(),
        snapshot: snapshot::encode(br#"{"tables":[],"forms":[],"process":{}}"#),
        change_type: change_type.to_string(),
        change_log: None,
        published_by: None,
    }
}

/// Deploy once per change type, returning the produced numbers in order
pub async fn deploy_sequence(
    store: &SharedStore,
    name: &str,
    change_types: &[&str],
) -> Vec<SemanticVersion> {
    let mut versions = Vec::with_capacity(change_types.len());
    for change_type in change_types {
        let response = deploy::handle(store.clone(), TEST_MAX_SNAPSHOT_BYTES, command(name, change_type))
            .await
            .unwrap();
        versions.push(response.version);
    }
    versions
}

/// Start one instance against the active version
pub async fn start_instance(store: &SharedStore, name: &str) -> Uuid {
    let command = start_process::StartProcessCommand {
        function_unit_name: name.to_string(),
        start_user_id: Some("tester".to_string()),
        variables: None,
    };
    start_process::handle(store.clone(), command)
        .await
        .unwrap()
        .process_instance_id
}

// ============================================================================
// Fault injection
// ============================================================================

/// Switches read by [`FaultyStore`] on every call
#[derive(Debug, Default)]
pub struct Faults {
    /// `set_active` reports success without doing anything
    pub skip_set_active: AtomicBool,
    /// `process_bindings` reports an extra instance bound to a missing version
    pub dangling_binding: AtomicBool,
    /// Number of upcoming commits that fail; decremented per failure
    pub failing_commits: AtomicU32,
}

pub struct FaultyStore {
    inner: InMemoryVersionStore,
    pub faults: Arc<Faults>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryVersionStore::new(TEST_LOCK_TIMEOUT),
            faults: Arc::new(Faults::default()),
        }
    }
}

struct FaultyTransaction {
    inner: Box<dyn UnitTransaction>,
    faults: Arc<Faults>,
}

#[async_trait]
impl VersionStore for FaultyStore {
    async fn lock(&self, name: &str) -> DbResult<Box<dyn UnitTransaction>> {
        let inner = self.inner.lock(name).await?;
        Ok(Box::new(FaultyTransaction {
            inner,
            faults: self.faults.clone(),
        }))
    }

    async fn list_function_units(&self) -> DbResult<Vec<FunctionUnitSummary>> {
        self.inner.list_function_units().await
    }

    async fn find_function_unit(&self, name: &str) -> DbResult<Option<FunctionUnit>> {
        self.inner.find_function_unit(name).await
    }

    async fn list_versions(&self, name: &str) -> DbResult<Vec<Version>> {
        self.inner.list_versions(name).await
    }

    async fn get_active_version(&self, name: &str) -> DbResult<Option<Version>> {
        self.inner.get_active_version(name).await
    }

    async fn find_version(
        &self,
        name: &str,
        version: &SemanticVersion,
    ) -> DbResult<Option<Version>> {
        self.inner.find_version(name, version).await
    }

    async fn count_process_instances(&self, version_id: Uuid) -> DbResult<i64> {
        self.inner.count_process_instances(version_id).await
    }

    async fn process_bindings(&self, name: &str) -> DbResult<Vec<ProcessBinding>> {
        self.inner.process_bindings(name).await
    }

    async fn health_check(&self) -> DbResult<()> {
        self.inner.health_check().await
    }
}

#[async_trait]
impl UnitTransaction for FaultyTransaction {
    fn function_unit(&self) -> &FunctionUnit {
        self.inner.function_unit()
    }

    async fn list_versions(&mut self) -> DbResult<Vec<Version>> {
        self.inner.list_versions().await
    }

    async fn active_version(&mut self) -> DbResult<Option<Version>> {
        self.inner.active_version().await
    }

    async fn append_version(&mut self, version: NewVersion) -> DbResult<Version> {
        self.inner.append_version(version).await
    }

    async fn set_active(&mut self, version_id: Uuid) -> DbResult<()> {
        if self.faults.skip_set_active.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.set_active(version_id).await
    }

    async fn delete_versions_above(
        &mut self,
        target: &SemanticVersion,
    ) -> DbResult<Vec<DeletedVersion>> {
        self.inner.delete_versions_above(target).await
    }

    async fn count_process_instances(&mut self, version_id: Uuid) -> DbResult<i64> {
        self.inner.count_process_instances(version_id).await
    }

    async fn insert_process_instance(
        &mut self,
        instance: NewProcessInstance,
    ) -> DbResult<ProcessInstance> {
        self.inner.insert_process_instance(instance).await
    }

    async fn process_bindings(&mut self) -> DbResult<Vec<ProcessBinding>> {
        let mut bindings = self.inner.process_bindings().await?;
        if self.faults.dangling_binding.load(Ordering::SeqCst) {
            bindings.push(ProcessBinding {
                process_instance_id: Uuid::new_v4(),
                version_id: Uuid::new_v4(),
            });
        }
        Ok(bindings)
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        let fail = self
            .faults
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            // Dropping `inner` discards the working copy
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        self.inner.commit().await
    }
}
