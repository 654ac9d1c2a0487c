//! API request and response types
//!
//! Mirror the server's JSON; only the fields the CLI reads are declared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unitver_common::SemanticVersion;
use uuid::Uuid;

/// Success envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

/// Error envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployRequest {
    /// Base64 of the snapshot file
    pub snapshot: String,
    pub change_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployResult {
    pub function_unit_name: String,
    pub version_id: Uuid,
    pub version: SemanticVersion,
    pub deployed_at: DateTime<Utc>,
    pub process_definition_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionHistory {
    pub function_unit_name: String,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version_id: Uuid,
    pub version: SemanticVersion,
    pub is_active: bool,
    pub deployed_at: DateTime<Utc>,
    pub published_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_log: Option<String>,
    pub process_instance_count: i64,
    pub can_rollback: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveVersion {
    pub function_unit_name: String,
    pub version_id: Uuid,
    pub version: SemanticVersion,
    pub deployed_at: DateTime<Utc>,
    pub published_by: String,
    #[serde(default)]
    pub change_log: Option<String>,
    pub process_definition_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionUnitList {
    pub function_units: Vec<FunctionUnitSummary>,
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionUnitSummary {
    pub function_unit_name: String,
    pub status: String,
    pub current_version: Option<SemanticVersion>,
    pub deployed_at: Option<DateTime<Utc>>,
    pub version_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotExport {
    pub function_unit_name: String,
    pub version: SemanticVersion,
    /// Base64 of the stored blob
    pub snapshot: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackImpact {
    pub function_unit_name: String,
    pub target_version: SemanticVersion,
    pub versions_to_delete: Vec<SemanticVersion>,
    pub total_process_instances_to_delete: i64,
    pub can_proceed: bool,
    #[serde(default)]
    pub warning_message: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollbackRequest {
    pub target_version: String,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollbackResult {
    pub function_unit_name: String,
    pub rolled_back_to_version: SemanticVersion,
    pub deleted_versions: Vec<SemanticVersion>,
    pub deleted_process_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantReport {
    pub function_unit_name: String,
    pub healthy: bool,
    pub violations: Vec<InvariantViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    pub code: String,
    pub message: String,
}
