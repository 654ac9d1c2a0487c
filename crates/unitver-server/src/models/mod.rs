//! Domain records
//!
//! The entity graph is expressed with ids rather than object references:
//! a [`Version`] points at its function unit through `function_unit_id`, and a
//! [`ProcessInstance`] points at its version through `version_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unitver_common::SemanticVersion;
use uuid::Uuid;

/// Lifecycle of a function unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionUnitStatus {
    Draft,
    Published,
}

impl FunctionUnitStatus {
    /// Convert to database string
    pub fn as_db_str(&self) -> &'static str {
        match self {
            FunctionUnitStatus::Draft => "DRAFT",
            FunctionUnitStatus::Published => "PUBLISHED",
        }
    }

    /// Create from database string
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(FunctionUnitStatus::Draft),
            "PUBLISHED" => Some(FunctionUnitStatus::Published),
            _ => None,
        }
    }
}

/// Aggregate root owning an ordered collection of versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionUnit {
    pub id: Uuid,
    pub name: String,
    pub status: FunctionUnitStatus,
    /// Number of the active version, `None` until the first deploy
    pub current_version: Option<SemanticVersion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FunctionUnit {
    /// A draft unit as created on first publish
    pub fn draft(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: FunctionUnitStatus::Draft,
            current_version: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Immutable snapshot of a function unit; only `is_active` ever changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub id: Uuid,
    pub function_unit_id: Uuid,
    pub version: SemanticVersion,
    pub change_log: Option<String>,
    pub snapshot: Vec<u8>,
    pub published_by: String,
    pub published_at: DateTime<Utc>,
    pub is_active: bool,
    pub process_definition_key: String,
}

/// Input for appending a version; the store assigns id and timestamp
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub version: SemanticVersion,
    pub change_log: Option<String>,
    pub snapshot: Vec<u8>,
    pub published_by: String,
    pub process_definition_key: String,
}

/// Key under which a version's process definition is registered
pub fn process_definition_key(function_unit: &str, version: &SemanticVersion) -> String {
    format!("{}_v{}", function_unit, version)
}

/// A running process, permanently bound to the version active at its start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub id: Uuid,
    pub function_unit_id: Uuid,
    pub version_id: Uuid,
    pub process_definition_key: String,
    pub status: String,
    pub start_user_id: Option<String>,
    pub variables: serde_json::Value,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProcessInstance {
    pub version_id: Uuid,
    pub process_definition_key: String,
    pub start_user_id: Option<String>,
    pub variables: serde_json::Value,
}

/// Status given to freshly started instances
pub const PROCESS_STATUS_RUNNING: &str = "RUNNING";

/// Instance-to-version reference, as inspected by the invariant checker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessBinding {
    pub process_instance_id: Uuid,
    pub version_id: Uuid,
}

/// A version removed by a rollback, with the instances cascaded alongside it
#[derive(Debug, Clone)]
pub struct DeletedVersion {
    pub version: Version,
    pub deleted_process_instances: u64,
}

/// Listing row for a function unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionUnitSummary {
    pub function_unit_name: String,
    pub status: FunctionUnitStatus,
    pub current_version: Option<SemanticVersion>,
    pub deployed_at: Option<DateTime<Utc>>,
    pub version_count: i64,
    pub active_version_id: Option<Uuid>,
}
