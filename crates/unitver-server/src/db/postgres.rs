//! PostgreSQL [`VersionStore`]
//!
//! Serialization relies on a row lock over the unit's `function_units`
//! record. The record is upserted first so that the very first deploy of a
//! unit contends on the same row as every later one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use unitver_common::SemanticVersion;
use uuid::Uuid;

use super::{DbError, DbResult, UnitTransaction, VersionStore};
use crate::config::VersioningConfig;
use crate::models::{
    DeletedVersion, FunctionUnit, FunctionUnitStatus, FunctionUnitSummary, NewProcessInstance,
    NewVersion, ProcessBinding, ProcessInstance, Version, PROCESS_STATUS_RUNNING,
};

/// SQLSTATE raised when `lock_timeout` expires
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// SQLSTATE raised when `statement_timeout` expires
const QUERY_CANCELED: &str = "57014";

// ============================================================================
// Row mapping
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct FunctionUnitRow {
    id: Uuid,
    name: String,
    status: String,
    current_version: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FunctionUnitRow> for FunctionUnit {
    type Error = DbError;

    fn try_from(row: FunctionUnitRow) -> DbResult<Self> {
        let status = FunctionUnitStatus::from_db_str(&row.status)
            .ok_or_else(|| decode_error(format!("unknown function unit status '{}'", row.status)))?;
        let current_version = row
            .current_version
            .as_deref()
            .map(parse_stored_version)
            .transpose()?;

        Ok(FunctionUnit {
            id: row.id,
            name: row.name,
            status,
            current_version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    function_unit_id: Uuid,
    version: String,
    change_log: Option<String>,
    snapshot: Vec<u8>,
    published_by: String,
    published_at: DateTime<Utc>,
    is_active: bool,
    process_definition_key: String,
}

impl TryFrom<VersionRow> for Version {
    type Error = DbError;

    fn try_from(row: VersionRow) -> DbResult<Self> {
        Ok(Version {
            id: row.id,
            function_unit_id: row.function_unit_id,
            version: parse_stored_version(&row.version)?,
            change_log: row.change_log,
            snapshot: row.snapshot,
            published_by: row.published_by,
            published_at: row.published_at,
            is_active: row.is_active,
            process_definition_key: row.process_definition_key,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProcessInstanceRow {
    id: Uuid,
    function_unit_id: Uuid,
    version_id: Uuid,
    process_definition_key: String,
    status: String,
    start_user_id: Option<String>,
    variables: serde_json::Value,
    started_at: DateTime<Utc>,
}

impl From<ProcessInstanceRow> for ProcessInstance {
    fn from(row: ProcessInstanceRow) -> Self {
        ProcessInstance {
            id: row.id,
            function_unit_id: row.function_unit_id,
            version_id: row.version_id,
            process_definition_key: row.process_definition_key,
            status: row.status,
            start_user_id: row.start_user_id,
            variables: row.variables,
            started_at: row.started_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    name: String,
    status: String,
    current_version: Option<String>,
    deployed_at: Option<DateTime<Utc>>,
    version_count: i64,
    active_version_id: Option<Uuid>,
}

fn decode_error(message: String) -> DbError {
    DbError::Sqlx(sqlx::Error::Decode(message.into()))
}

fn parse_stored_version(raw: &str) -> DbResult<SemanticVersion> {
    SemanticVersion::parse(raw).map_err(|e| decode_error(e.to_string()))
}

fn rows_into<R, T>(rows: Vec<R>) -> DbResult<Vec<T>>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Map lock and statement timeouts to [`DbError::LockTimeout`]
fn lock_error(name: &str) -> impl Fn(sqlx::Error) -> DbError + '_ {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if matches!(db_err.code().as_deref(), Some(LOCK_NOT_AVAILABLE | QUERY_CANCELED)) {
                tracing::warn!(function_unit = %name, "Lock wait exceeded timeout");
                return DbError::LockTimeout(name.to_string());
            }
        }
        DbError::Sqlx(e)
    }
}

// ============================================================================
// Store
// ============================================================================

pub struct PgVersionStore {
    pool: PgPool,
    lock_timeout_ms: u64,
    statement_timeout_ms: u64,
}

impl PgVersionStore {
    pub fn new(pool: PgPool, config: &VersioningConfig) -> Self {
        Self {
            pool,
            lock_timeout_ms: config.lock_timeout_ms,
            statement_timeout_ms: config.statement_timeout_ms,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl VersionStore for PgVersionStore {
    #[tracing::instrument(skip(self))]
    async fn lock(&self, name: &str) -> DbResult<Box<dyn UnitTransaction>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true), set_config('statement_timeout', $2, true)")
            .bind(format!("{}ms", self.lock_timeout_ms))
            .bind(format!("{}ms", self.statement_timeout_ms))
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO function_units (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(lock_error(name))?;

        let row = sqlx::query_as::<_, FunctionUnitRow>(
            r#"
            SELECT id, name, status, current_version, created_at, updated_at
            FROM function_units
            WHERE name = $1
            FOR UPDATE
            "#,
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(lock_error(name))?;

        tracing::debug!(function_unit = %name, "Acquired function unit lock");

        Ok(Box::new(PgUnitTransaction {
            tx,
            unit: row.try_into()?,
        }))
    }

    async fn list_function_units(&self) -> DbResult<Vec<FunctionUnitSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT fu.name, fu.status, fu.current_version,
                   av.published_at AS deployed_at,
                   av.id AS active_version_id,
                   (SELECT COUNT(*) FROM versions v WHERE v.function_unit_id = fu.id) AS version_count
            FROM function_units fu
            LEFT JOIN versions av ON av.function_unit_id = fu.id AND av.is_active
            ORDER BY fu.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(FunctionUnitSummary {
                    status: FunctionUnitStatus::from_db_str(&row.status).ok_or_else(|| {
                        decode_error(format!("unknown function unit status '{}'", row.status))
                    })?,
                    current_version: row
                        .current_version
                        .as_deref()
                        .map(parse_stored_version)
                        .transpose()?,
                    function_unit_name: row.name,
                    deployed_at: row.deployed_at,
                    version_count: row.version_count,
                    active_version_id: row.active_version_id,
                })
            })
            .collect()
    }

    async fn find_function_unit(&self, name: &str) -> DbResult<Option<FunctionUnit>> {
        sqlx::query_as::<_, FunctionUnitRow>(
            r#"
            SELECT id, name, status, current_version, created_at, updated_at
            FROM function_units
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .map(FunctionUnit::try_from)
        .transpose()
    }

    async fn list_versions(&self, name: &str) -> DbResult<Vec<Version>> {
        let rows = sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT v.id, v.function_unit_id, v.version, v.change_log, v.snapshot,
                   v.published_by, v.published_at, v.is_active, v.process_definition_key
            FROM versions v
            JOIN function_units fu ON fu.id = v.function_unit_id
            WHERE fu.name = $1
            ORDER BY v.version_major DESC, v.version_minor DESC, v.version_patch DESC
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows_into(rows)
    }

    async fn get_active_version(&self, name: &str) -> DbResult<Option<Version>> {
        sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT v.id, v.function_unit_id, v.version, v.change_log, v.snapshot,
                   v.published_by, v.published_at, v.is_active, v.process_definition_key
            FROM versions v
            JOIN function_units fu ON fu.id = v.function_unit_id
            WHERE fu.name = $1 AND v.is_active
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .map(Version::try_from)
        .transpose()
    }

    async fn find_version(
        &self,
        name: &str,
        version: &SemanticVersion,
    ) -> DbResult<Option<Version>> {
        sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT v.id, v.function_unit_id, v.version, v.change_log, v.snapshot,
                   v.published_by, v.published_at, v.is_active, v.process_definition_key
            FROM versions v
            JOIN function_units fu ON fu.id = v.function_unit_id
            WHERE fu.name = $1
              AND v.version_major = $2 AND v.version_minor = $3 AND v.version_patch = $4
            "#,
        )
        .bind(name)
        .bind(i64::from(version.major))
        .bind(i64::from(version.minor))
        .bind(i64::from(version.patch))
        .fetch_optional(&self.pool)
        .await?
        .map(Version::try_from)
        .transpose()
    }

    async fn count_process_instances(&self, version_id: Uuid) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM process_instances WHERE version_id = $1",
        )
        .bind(version_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn process_bindings(&self, name: &str) -> DbResult<Vec<ProcessBinding>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT pi.id, pi.version_id
            FROM process_instances pi
            JOIN function_units fu ON fu.id = pi.function_unit_id
            WHERE fu.name = $1
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(process_instance_id, version_id)| ProcessBinding {
                process_instance_id,
                version_id,
            })
            .collect())
    }

    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(DbError::from)
    }
}

// ============================================================================
// Locked transaction
// ============================================================================

struct PgUnitTransaction {
    tx: Transaction<'static, Postgres>,
    unit: FunctionUnit,
}

#[async_trait]
impl UnitTransaction for PgUnitTransaction {
    fn function_unit(&self) -> &FunctionUnit {
        &self.unit
    }

    async fn list_versions(&mut self) -> DbResult<Vec<Version>> {
        let rows = sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT id, function_unit_id, version, change_log, snapshot,
                   published_by, published_at, is_active, process_definition_key
            FROM versions
            WHERE function_unit_id = $1
            ORDER BY version_major DESC, version_minor DESC, version_patch DESC
            "#,
        )
        .bind(self.unit.id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows_into(rows)
    }

    async fn active_version(&mut self) -> DbResult<Option<Version>> {
        sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT id, function_unit_id, version, change_log, snapshot,
                   published_by, published_at, is_active, process_definition_key
            FROM versions
            WHERE function_unit_id = $1 AND is_active
            "#,
        )
        .bind(self.unit.id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Version::try_from)
        .transpose()
    }

    async fn append_version(&mut self, new: NewVersion) -> DbResult<Version> {
        let row = sqlx::query_as::<_, VersionRow>(
            r#"
            INSERT INTO versions (
                function_unit_id, version, version_major, version_minor, version_patch,
                change_log, snapshot, published_by, is_active, process_definition_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9)
            RETURNING id, function_unit_id, version, change_log, snapshot,
                      published_by, published_at, is_active, process_definition_key
            "#,
        )
        .bind(self.unit.id)
        .bind(new.version.to_string())
        .bind(i64::from(new.version.major))
        .bind(i64::from(new.version.minor))
        .bind(i64::from(new.version.patch))
        .bind(&new.change_log)
        .bind(&new.snapshot)
        .bind(&new.published_by)
        .bind(&new.process_definition_key)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return DbError::duplicate(
                        "Version",
                        &format!("{}@{}", self.unit.name, new.version),
                    );
                }
            }
            DbError::Sqlx(e)
        })?;

        let version = Version::try_from(row)?;

        tracing::debug!(
            version_id = %version.id,
            function_unit = %self.unit.name,
            version = %version.version,
            "Appended version"
        );

        Ok(version)
    }

    async fn set_active(&mut self, version_id: Uuid) -> DbResult<()> {
        let version: String = sqlx::query_scalar(
            "SELECT version FROM versions WHERE id = $1 AND function_unit_id = $2",
        )
        .bind(version_id)
        .bind(self.unit.id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| DbError::not_found("Version", &version_id.to_string()))?;

        // Deactivate first so the partial unique index never sees two actives
        sqlx::query("UPDATE versions SET is_active = FALSE WHERE function_unit_id = $1 AND is_active")
            .bind(self.unit.id)
            .execute(&mut *self.tx)
            .await?;

        sqlx::query("UPDATE versions SET is_active = TRUE WHERE id = $1")
            .bind(version_id)
            .execute(&mut *self.tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE function_units
            SET current_version = $2, status = 'PUBLISHED', updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(self.unit.id)
        .bind(version)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_versions_above(
        &mut self,
        target: &SemanticVersion,
    ) -> DbResult<Vec<DeletedVersion>> {
        let rows = sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT id, function_unit_id, version, change_log, snapshot,
                   published_by, published_at, is_active, process_definition_key
            FROM versions
            WHERE function_unit_id = $1
              AND (version_major, version_minor, version_patch) > ($2, $3, $4)
            ORDER BY version_major DESC, version_minor DESC, version_patch DESC
            "#,
        )
        .bind(self.unit.id)
        .bind(i64::from(target.major))
        .bind(i64::from(target.minor))
        .bind(i64::from(target.patch))
        .fetch_all(&mut *self.tx)
        .await?;

        let mut deleted = Vec::with_capacity(rows.len());
        for row in rows {
            let version = Version::try_from(row)?;

            let instances = sqlx::query("DELETE FROM process_instances WHERE version_id = $1")
                .bind(version.id)
                .execute(&mut *self.tx)
                .await?
                .rows_affected();

            sqlx::query("DELETE FROM versions WHERE id = $1")
                .bind(version.id)
                .execute(&mut *self.tx)
                .await?;

            deleted.push(DeletedVersion {
                version,
                deleted_process_instances: instances,
            });
        }

        Ok(deleted)
    }

    async fn count_process_instances(&mut self, version_id: Uuid) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM process_instances WHERE version_id = $1",
        )
        .bind(version_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn insert_process_instance(
        &mut self,
        new: NewProcessInstance,
    ) -> DbResult<ProcessInstance> {
        let row = sqlx::query_as::<_, ProcessInstanceRow>(
            r#"
            INSERT INTO process_instances (
                function_unit_id, version_id, process_definition_key, status,
                start_user_id, variables
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, function_unit_id, version_id, process_definition_key, status,
                      start_user_id, variables, started_at
            "#,
        )
        .bind(self.unit.id)
        .bind(new.version_id)
        .bind(&new.process_definition_key)
        .bind(PROCESS_STATUS_RUNNING)
        .bind(&new.start_user_id)
        .bind(&new.variables)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_foreign_key_violation() {
                    return DbError::not_found("Version", &new.version_id.to_string());
                }
            }
            DbError::Sqlx(e)
        })?;

        Ok(row.into())
    }

    async fn process_bindings(&mut self) -> DbResult<Vec<ProcessBinding>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT id, version_id FROM process_instances WHERE function_unit_id = $1",
        )
        .bind(self.unit.id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(process_instance_id, version_id)| ProcessBinding {
                process_instance_id,
                version_id,
            })
            .collect())
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::process_definition_key;

    fn store(pool: PgPool) -> PgVersionStore {
        PgVersionStore::new(pool, &VersioningConfig::default())
    }

    fn new_version(major: u32, minor: u32, patch: u32) -> NewVersion {
        let version = SemanticVersion::new(major, minor, patch);
        NewVersion {
            version,
            change_log: Some("test".to_string()),
            snapshot: vec![1, 2, 3],
            published_by: "tester".to_string(),
            process_definition_key: process_definition_key("orders", &version),
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_lock_creates_unit_only_on_commit(pool: PgPool) -> sqlx::Result<()> {
        let store = store(pool);

        let tx = store.lock("orders").await.unwrap();
        assert_eq!(tx.function_unit().status, FunctionUnitStatus::Draft);
        drop(tx);
        assert!(store.find_function_unit("orders").await.unwrap().is_none());

        let tx = store.lock("orders").await.unwrap();
        tx.commit().await.unwrap();
        assert!(store.find_function_unit("orders").await.unwrap().is_some());
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_set_active_flips_single_version(pool: PgPool) -> sqlx::Result<()> {
        let store = store(pool);

        let mut tx = store.lock("orders").await.unwrap();
        let v1 = tx.append_version(new_version(1, 0, 0)).await.unwrap();
        let v2 = tx.append_version(new_version(1, 1, 0)).await.unwrap();
        tx.set_active(v1.id).await.unwrap();
        tx.set_active(v2.id).await.unwrap();
        tx.commit().await.unwrap();

        let versions = store.list_versions("orders").await.unwrap();
        assert_eq!(versions.iter().filter(|v| v.is_active).count(), 1);
        assert_eq!(versions[0].id, v2.id);
        assert!(versions[0].is_active);

        let unit = store.find_function_unit("orders").await.unwrap().unwrap();
        assert_eq!(unit.current_version, Some(SemanticVersion::new(1, 1, 0)));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_duplicate_version_is_reported(pool: PgPool) -> sqlx::Result<()> {
        let store = store(pool);

        let mut tx = store.lock("orders").await.unwrap();
        tx.append_version(new_version(1, 0, 0)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.lock("orders").await.unwrap();
        let err = tx.append_version(new_version(1, 0, 0)).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_delete_versions_above_cascades(pool: PgPool) -> sqlx::Result<()> {
        let store = store(pool);

        let mut tx = store.lock("orders").await.unwrap();
        let v1 = tx.append_version(new_version(1, 0, 0)).await.unwrap();
        let v2 = tx.append_version(new_version(1, 1, 0)).await.unwrap();
        tx.set_active(v2.id).await.unwrap();
        tx.insert_process_instance(NewProcessInstance {
            version_id: v2.id,
            process_definition_key: v2.process_definition_key.clone(),
            start_user_id: Some("alice".to_string()),
            variables: serde_json::json!({"amount": 10}),
        })
        .await
        .unwrap();

        let deleted = tx
            .delete_versions_above(&SemanticVersion::new(1, 0, 0))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].deleted_process_instances, 1);

        tx.set_active(v1.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.list_versions("orders").await.unwrap().len(), 1);
        assert!(store.process_bindings("orders").await.unwrap().is_empty());
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_second_writer_times_out(pool: PgPool) -> sqlx::Result<()> {
        let config = VersioningConfig {
            lock_timeout_ms: 100,
            ..VersioningConfig::default()
        };
        let store = PgVersionStore::new(pool, &config);

        let first = store.lock("orders").await.unwrap();
        first.commit().await.unwrap();

        let _held = store.lock("orders").await.unwrap();
        let err = store.lock("orders").await.err().unwrap();
        assert!(matches!(err, DbError::LockTimeout(_)));
        Ok(())
    }
}
