//! In-memory [`VersionStore`]
//!
//! Committed state sits behind one `RwLock`; each function unit additionally
//! has its own writer mutex. A [`UnitTransaction`] holds that mutex, mutates a
//! private copy of the unit's state and publishes the copy on commit, so a
//! dropped transaction leaves no trace and readers never see partial writes.

use async_trait::async_trait;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use unitver_common::SemanticVersion;
use uuid::Uuid;

use super::{DbError, DbResult, UnitTransaction, VersionStore};
use crate::models::{
    DeletedVersion, FunctionUnit, FunctionUnitStatus, FunctionUnitSummary, NewProcessInstance,
    NewVersion, ProcessBinding, ProcessInstance, Version, PROCESS_STATUS_RUNNING,
};

#[derive(Debug, Clone)]
struct UnitState {
    unit: FunctionUnit,
    /// Ascending by version number
    versions: Vec<Version>,
    instances: Vec<ProcessInstance>,
}

impl UnitState {
    fn new(name: &str) -> Self {
        Self {
            unit: FunctionUnit::draft(name),
            versions: Vec::new(),
            instances: Vec::new(),
        }
    }

    fn newest_first(&self) -> Vec<Version> {
        self.versions.iter().rev().cloned().collect()
    }

    fn active(&self) -> Option<Version> {
        self.versions.iter().rev().find(|v| v.is_active).cloned()
    }

    fn bindings(&self) -> Vec<ProcessBinding> {
        self.instances
            .iter()
            .map(|p| ProcessBinding {
                process_instance_id: p.id,
                version_id: p.version_id,
            })
            .collect()
    }

    fn count_instances(&self, version_id: Uuid) -> i64 {
        self.instances
            .iter()
            .filter(|p| p.version_id == version_id)
            .count() as i64
    }

    fn summary(&self) -> FunctionUnitSummary {
        let active = self.active();
        FunctionUnitSummary {
            function_unit_name: self.unit.name.clone(),
            status: self.unit.status,
            current_version: self.unit.current_version,
            deployed_at: active.as_ref().map(|v| v.published_at),
            version_count: self.versions.len() as i64,
            active_version_id: active.map(|v| v.id),
        }
    }
}

type Units = Arc<RwLock<HashMap<String, UnitState>>>;

/// Process-local store; state is lost when the store is dropped
pub struct InMemoryVersionStore {
    committed: Units,
    writers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
}

impl InMemoryVersionStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            committed: Arc::new(RwLock::new(HashMap::new())),
            writers: Mutex::new(HashMap::new()),
            lock_timeout,
        }
    }

    /// Idle writers are pruned on each call. A writer nobody else holds has
    /// no owner or waiter, and clones only happen under this lock.
    async fn writer_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut writers = self.writers.lock().await;
        writers.retain(|_, writer| Arc::strong_count(writer) > 1);
        writers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_unit<T>(&self, name: &str, f: impl FnOnce(&UnitState) -> T) -> Option<T> {
        self.committed.read().await.get(name).map(f)
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn lock(&self, name: &str) -> DbResult<Box<dyn UnitTransaction>> {
        let writer = self.writer_for(name).await;
        let guard = tokio::time::timeout(self.lock_timeout, writer.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(function_unit = %name, "Lock wait exceeded timeout");
                DbError::LockTimeout(name.to_string())
            })?;

        let working = self
            .read_unit(name, UnitState::clone)
            .await
            .unwrap_or_else(|| UnitState::new(name));

        Ok(Box::new(MemoryUnitTransaction {
            _guard: guard,
            name: name.to_string(),
            working,
            committed: Arc::clone(&self.committed),
        }))
    }

    async fn list_function_units(&self) -> DbResult<Vec<FunctionUnitSummary>> {
        let units = self.committed.read().await;
        let mut summaries: Vec<_> = units.values().map(UnitState::summary).collect();
        summaries.sort_by(|a, b| a.function_unit_name.cmp(&b.function_unit_name));
        Ok(summaries)
    }

    async fn find_function_unit(&self, name: &str) -> DbResult<Option<FunctionUnit>> {
        Ok(self.read_unit(name, |s| s.unit.clone()).await)
    }

    async fn list_versions(&self, name: &str) -> DbResult<Vec<Version>> {
        Ok(self
            .read_unit(name, UnitState::newest_first)
            .await
            .unwrap_or_default())
    }

    async fn get_active_version(&self, name: &str) -> DbResult<Option<Version>> {
        Ok(self.read_unit(name, UnitState::active).await.flatten())
    }

    async fn find_version(
        &self,
        name: &str,
        version: &SemanticVersion,
    ) -> DbResult<Option<Version>> {
        Ok(self
            .read_unit(name, |s| {
                s.versions.iter().find(|v| v.version == *version).cloned()
            })
            .await
            .flatten())
    }

    async fn count_process_instances(&self, version_id: Uuid) -> DbResult<i64> {
        let units = self.committed.read().await;
        Ok(units.values().map(|s| s.count_instances(version_id)).sum())
    }

    async fn process_bindings(&self, name: &str) -> DbResult<Vec<ProcessBinding>> {
        Ok(self
            .read_unit(name, UnitState::bindings)
            .await
            .unwrap_or_default())
    }

    async fn health_check(&self) -> DbResult<()> {
        Ok(())
    }
}

struct MemoryUnitTransaction {
    _guard: OwnedMutexGuard<()>,
    name: String,
    working: UnitState,
    committed: Units,
}

#[async_trait]
impl UnitTransaction for MemoryUnitTransaction {
    fn function_unit(&self) -> &FunctionUnit {
        &self.working.unit
    }

    async fn list_versions(&mut self) -> DbResult<Vec<Version>> {
        Ok(self.working.newest_first())
    }

    async fn active_version(&mut self) -> DbResult<Option<Version>> {
        Ok(self.working.active())
    }

    async fn append_version(&mut self, new: NewVersion) -> DbResult<Version> {
        if self.working.versions.iter().any(|v| v.version == new.version) {
            return Err(DbError::duplicate(
                "Version",
                &format!("{}@{}", self.name, new.version),
            ));
        }

        let version = Version {
            id: Uuid::new_v4(),
            function_unit_id: self.working.unit.id,
            version: new.version,
            change_log: new.change_log,
            snapshot: new.snapshot,
            published_by: new.published_by,
            published_at: Utc::now(),
            is_active: false,
            process_definition_key: new.process_definition_key,
        };

        self.working.versions.push(version.clone());
        self.working.versions.sort_by_key(|v| v.version);

        Ok(version)
    }

    async fn set_active(&mut self, version_id: Uuid) -> DbResult<()> {
        let target = self
            .working
            .versions
            .iter()
            .find(|v| v.id == version_id)
            .map(|v| v.version)
            .ok_or_else(|| DbError::not_found("Version", &version_id.to_string()))?;

        for version in &mut self.working.versions {
            version.is_active = version.id == version_id;
        }

        let unit = &mut self.working.unit;
        unit.current_version = Some(target);
        unit.status = FunctionUnitStatus::Published;
        unit.updated_at = Utc::now();

        Ok(())
    }

    async fn delete_versions_above(
        &mut self,
        target: &SemanticVersion,
    ) -> DbResult<Vec<DeletedVersion>> {
        let mut deleted = Vec::new();

        while let Some(newest) = self.working.versions.last() {
            if newest.version <= *target {
                break;
            }
            let version_id = newest.id;

            let before = self.working.instances.len();
            self.working.instances.retain(|p| p.version_id != version_id);
            let deleted_process_instances = (before - self.working.instances.len()) as u64;

            if let Some(version) = self.working.versions.pop() {
                deleted.push(DeletedVersion {
                    version,
                    deleted_process_instances,
                });
            }
        }

        Ok(deleted)
    }

    async fn count_process_instances(&mut self, version_id: Uuid) -> DbResult<i64> {
        Ok(self.working.count_instances(version_id))
    }

    async fn insert_process_instance(
        &mut self,
        new: NewProcessInstance,
    ) -> DbResult<ProcessInstance> {
        if !self.working.versions.iter().any(|v| v.id == new.version_id) {
            return Err(DbError::not_found("Version", &new.version_id.to_string()));
        }

        let instance = ProcessInstance {
            id: Uuid::new_v4(),
            function_unit_id: self.working.unit.id,
            version_id: new.version_id,
            process_definition_key: new.process_definition_key,
            status: PROCESS_STATUS_RUNNING.to_string(),
            start_user_id: new.start_user_id,
            variables: new.variables,
            started_at: Utc::now(),
        };
        self.working.instances.push(instance.clone());

        Ok(instance)
    }

    async fn process_bindings(&mut self) -> DbResult<Vec<ProcessBinding>> {
        Ok(self.working.bindings())
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        let MemoryUnitTransaction {
            _guard,
            name,
            working,
            committed,
        } = *self;

        committed.write().await.insert(name, working);
        drop(_guard);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_version(major: u32, minor: u32, patch: u32) -> NewVersion {
        let version = SemanticVersion::new(major, minor, patch);
        NewVersion {
            version,
            change_log: None,
            snapshot: b"{}".to_vec(),
            published_by: "tester".to_string(),
            process_definition_key: crate::models::process_definition_key("orders", &version),
        }
    }

    fn store() -> InMemoryVersionStore {
        InMemoryVersionStore::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_uncommitted_changes_are_discarded() {
        let store = store();

        let mut tx = store.lock("orders").await.unwrap();
        tx.append_version(new_version(1, 0, 0)).await.unwrap();
        drop(tx);

        assert!(store.find_function_unit("orders").await.unwrap().is_none());
        assert!(store.list_versions("orders").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_working_copy() {
        let store = store();

        let mut tx = store.lock("orders").await.unwrap();
        let v1 = tx.append_version(new_version(1, 0, 0)).await.unwrap();
        tx.set_active(v1.id).await.unwrap();
        tx.commit().await.unwrap();

        let unit = store.find_function_unit("orders").await.unwrap().unwrap();
        assert_eq!(unit.status, FunctionUnitStatus::Published);
        assert_eq!(unit.current_version, Some(SemanticVersion::new(1, 0, 0)));
        assert_eq!(store.get_active_version("orders").await.unwrap().unwrap().id, v1.id);
    }

    #[tokio::test]
    async fn test_append_rejects_duplicate_number() {
        let store = store();
        let mut tx = store.lock("orders").await.unwrap();
        tx.append_version(new_version(1, 0, 0)).await.unwrap();

        let err = tx.append_version(new_version(1, 0, 0)).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_versions_listed_newest_first() {
        let store = store();
        let mut tx = store.lock("orders").await.unwrap();
        tx.append_version(new_version(1, 0, 0)).await.unwrap();
        tx.append_version(new_version(1, 10, 0)).await.unwrap();
        tx.append_version(new_version(1, 2, 0)).await.unwrap();
        tx.commit().await.unwrap();

        let listed: Vec<String> = store
            .list_versions("orders")
            .await
            .unwrap()
            .iter()
            .map(|v| v.version.to_string())
            .collect();
        assert_eq!(listed, vec!["1.10.0", "1.2.0", "1.0.0"]);
    }

    #[tokio::test]
    async fn test_delete_versions_above_cascades_instances() {
        let store = store();
        let mut tx = store.lock("orders").await.unwrap();
        let v1 = tx.append_version(new_version(1, 0, 0)).await.unwrap();
        let v2 = tx.append_version(new_version(1, 1, 0)).await.unwrap();
        let v3 = tx.append_version(new_version(1, 2, 0)).await.unwrap();
        for version in [&v1, &v2, &v2, &v3] {
            tx.insert_process_instance(NewProcessInstance {
                version_id: version.id,
                process_definition_key: version.process_definition_key.clone(),
                start_user_id: None,
                variables: serde_json::json!({}),
            })
            .await
            .unwrap();
        }

        let deleted = tx
            .delete_versions_above(&SemanticVersion::new(1, 0, 0))
            .await
            .unwrap();

        let summary: Vec<(String, u64)> = deleted
            .iter()
            .map(|d| (d.version.version.to_string(), d.deleted_process_instances))
            .collect();
        assert_eq!(summary, vec![("1.2.0".to_string(), 1), ("1.1.0".to_string(), 2)]);
        assert_eq!(tx.list_versions().await.unwrap().len(), 1);
        assert_eq!(tx.process_bindings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lock_times_out_while_held() {
        let store = store();
        let _held = store.lock("orders").await.unwrap();

        let err = store.lock("orders").await.err().unwrap();
        assert!(matches!(err, DbError::LockTimeout(name) if name == "orders"));

        // Other units do not contend
        assert!(store.lock("invoices").await.is_ok());
    }

    #[tokio::test]
    async fn test_idle_writers_are_pruned() {
        let store = store();
        for i in 0..100 {
            let tx = store.lock(&format!("unknown_{}", i)).await.unwrap();
            drop(tx);
        }

        let _held = store.lock("orders").await.unwrap();
        let writers = store.writers.lock().await;
        assert_eq!(writers.len(), 1);
        assert!(writers.contains_key("orders"));
    }

    #[tokio::test]
    async fn test_pruning_keeps_held_writer_exclusive() {
        let store = store();
        let _held = store.lock("orders").await.unwrap();

        // Pruning triggered by another unit must not hand out a fresh mutex
        drop(store.lock("invoices").await.unwrap());
        assert!(matches!(
            store.lock("orders").await.err().unwrap(),
            DbError::LockTimeout(_)
        ));
    }

    #[tokio::test]
    async fn test_instance_requires_existing_version() {
        let store = store();
        let mut tx = store.lock("orders").await.unwrap();
        let err = tx
            .insert_process_instance(NewProcessInstance {
                version_id: Uuid::new_v4(),
                process_definition_key: "orders_v9.9.9".to_string(),
                start_user_id: None,
                variables: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }
}
