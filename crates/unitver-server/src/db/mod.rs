//! Version persistence
//!
//! [`VersionStore`] is the storage seam for the versioning engine. Writers go
//! through [`VersionStore::lock`], which serializes all mutation of a single
//! function unit and hands back a [`UnitTransaction`]; readers use the
//! lock-free snapshot methods on the store itself.
//!
//! Two implementations ship:
//!
//! - [`postgres::PgVersionStore`]: row lock on the `function_units` record
//!   (`SELECT ... FOR UPDATE`) inside a database transaction
//! - [`memory::InMemoryVersionStore`]: a per-unit async mutex over a private
//!   working copy, for tests and database-less runs

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use unitver_common::SemanticVersion;
use uuid::Uuid;

use crate::config::{Config, DatabaseConfig, StoreBackend};
use crate::models::{
    DeletedVersion, FunctionUnit, FunctionUnitSummary, NewProcessInstance, NewVersion,
    ProcessBinding, ProcessInstance, Version,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryVersionStore;
pub use postgres::PgVersionStore;

/// Persistence errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Database configuration is invalid or missing
    #[error("Database configuration error: {0}. Check DATABASE_URL and connection settings.")]
    Config(String),

    /// The per-unit lock or a statement inside the transaction timed out
    #[error("Timed out waiting for the lock on function unit '{0}'")]
    LockTimeout(String),

    /// Requested record does not exist
    #[error("{0}")]
    NotFound(String),

    /// Record already exists (unique constraint violation)
    #[error("{0}")]
    Duplicate(String),
}

impl DbError {
    /// Create a not found error with resource context
    pub fn not_found(resource_type: &str, identifier: &str) -> Self {
        Self::NotFound(format!("{} '{}' not found", resource_type, identifier))
    }

    /// Create a duplicate error with resource context
    pub fn duplicate(resource_type: &str, identifier: &str) -> Self {
        Self::Duplicate(format!("{} '{}' already exists", resource_type, identifier))
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Exclusive, transactional view of one function unit
///
/// Holding the value holds the unit's lock. Changes become visible only
/// through [`UnitTransaction::commit`]; dropping the value instead discards
/// every change made through it, including creation of the unit record.
#[async_trait]
pub trait UnitTransaction: Send {
    /// The locked unit as read when the lock was taken
    fn function_unit(&self) -> &FunctionUnit;

    /// All versions of the unit, newest first
    async fn list_versions(&mut self) -> DbResult<Vec<Version>>;

    async fn active_version(&mut self) -> DbResult<Option<Version>>;

    /// Insert an inactive version; `DbError::Duplicate` if the number exists
    async fn append_version(&mut self, version: NewVersion) -> DbResult<Version>;

    /// Make `version_id` the only active version and repoint the unit at it
    async fn set_active(&mut self, version_id: Uuid) -> DbResult<()>;

    /// Delete every version strictly newer than `target`, newest first,
    /// removing each version's bound process instances before the version
    async fn delete_versions_above(
        &mut self,
        target: &SemanticVersion,
    ) -> DbResult<Vec<DeletedVersion>>;

    async fn count_process_instances(&mut self, version_id: Uuid) -> DbResult<i64>;

    async fn insert_process_instance(
        &mut self,
        instance: NewProcessInstance,
    ) -> DbResult<ProcessInstance>;

    async fn process_bindings(&mut self) -> DbResult<Vec<ProcessBinding>>;

    async fn commit(self: Box<Self>) -> DbResult<()>;
}

/// Storage for versions, active pointers and process bindings
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Take the exclusive lock for `name`, creating the unit record if needed
    ///
    /// Blocks while another transaction holds the same unit; units with
    /// different names never contend.
    async fn lock(&self, name: &str) -> DbResult<Box<dyn UnitTransaction>>;

    async fn list_function_units(&self) -> DbResult<Vec<FunctionUnitSummary>>;

    async fn find_function_unit(&self, name: &str) -> DbResult<Option<FunctionUnit>>;

    /// Committed versions of `name`, newest first; empty for unknown units
    async fn list_versions(&self, name: &str) -> DbResult<Vec<Version>>;

    async fn get_active_version(&self, name: &str) -> DbResult<Option<Version>>;

    async fn find_version(&self, name: &str, version: &SemanticVersion)
        -> DbResult<Option<Version>>;

    async fn count_process_instances(&self, version_id: Uuid) -> DbResult<i64>;

    async fn process_bindings(&self, name: &str) -> DbResult<Vec<ProcessBinding>>;

    async fn health_check(&self) -> DbResult<()>;
}

/// Store handle shared across handlers
pub type SharedStore = Arc<dyn VersionStore>;

pub async fn create_pool(config: &DatabaseConfig) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Build the configured store, running migrations for the PostgreSQL backend
pub async fn open_store(config: &Config) -> DbResult<SharedStore> {
    match config.store {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database).await?;
            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .map_err(|e| DbError::config(format!("Failed to run migrations: {}", e)))?;
            tracing::info!("Database migrations completed");

            Ok(Arc::new(PgVersionStore::new(pool, &config.versioning)))
        },
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory version store; state is lost on shutdown");
            Ok(Arc::new(InMemoryVersionStore::new(
                config.versioning.lock_timeout(),
            )))
        },
    }
}
