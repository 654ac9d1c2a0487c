//! Rollback impact assessment
//!
//! Shared by the read-only planner and the executor. The planner reports the
//! assessment as a [`RollbackImpact`]; the executor repeats the assessment
//! under the unit lock before deleting anything.

use serde::{Deserialize, Serialize};
use unitver_common::SemanticVersion;
use uuid::Uuid;

use crate::db::{DbResult, VersionStore};
use crate::error::VersionValidationError;
use crate::models::Version;

/// Outcome of checking a rollback target against a unit's versions
#[derive(Debug, Clone)]
pub enum Assessment {
    Proceed {
        target: Version,
        /// Versions newer than the target, oldest first
        to_delete: Vec<Version>,
    },
    Rejected(VersionValidationError),
}

/// Check `target` against `versions` (any order)
pub fn assess(function_unit: &str, versions: Vec<Version>, target: &SemanticVersion) -> Assessment {
    let Some(found) = versions.iter().find(|v| v.version == *target).cloned() else {
        return Assessment::Rejected(VersionValidationError::RollbackVersionNotFound {
            version: *target,
            function_unit: function_unit.to_string(),
        });
    };

    if found.is_active {
        return Assessment::Rejected(VersionValidationError::RollbackToActiveVersion(*target));
    }

    let mut to_delete: Vec<Version> = versions.into_iter().filter(|v| v.version > *target).collect();
    to_delete.sort_by(|a, b| a.version.cmp(&b.version));

    Assessment::Proceed {
        target: found,
        to_delete,
    }
}

/// Pre-flight report of what a rollback would delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackImpact {
    pub function_unit_name: String,
    pub target_version: SemanticVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_version_id: Option<Uuid>,
    /// Oldest first
    pub versions_to_delete: Vec<SemanticVersion>,
    pub total_process_instances_to_delete: i64,
    pub can_proceed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RollbackImpact {
    fn rejected(function_unit: &str, target: SemanticVersion, reason: &VersionValidationError) -> Self {
        Self {
            function_unit_name: function_unit.to_string(),
            target_version: target,
            target_version_id: None,
            versions_to_delete: Vec::new(),
            total_process_instances_to_delete: 0,
            can_proceed: false,
            warning_message: None,
            error_message: Some(reason.to_string()),
        }
    }
}

pub fn warning_message(versions: usize, process_instances: i64) -> String {
    format!(
        "WARNING: This rollback operation will DELETE {} version(s) and {} process instance(s). \
         This action is IRREVERSIBLE. Please confirm you want to proceed.",
        versions, process_instances
    )
}

/// Assess `target` against committed state and count the affected instances
///
/// Takes no lock. The result may be stale by the time a confirmed rollback
/// runs, which is why the executor assesses again under the lock.
pub async fn plan(
    store: &dyn VersionStore,
    function_unit: &str,
    target: SemanticVersion,
) -> DbResult<(Assessment, RollbackImpact)> {
    let versions = store.list_versions(function_unit).await?;
    let assessment = assess(function_unit, versions, &target);

    let impact = match &assessment {
        Assessment::Rejected(reason) => RollbackImpact::rejected(function_unit, target, reason),
        Assessment::Proceed { target: found, to_delete } => {
            let mut total = 0;
            for version in to_delete {
                total += store.count_process_instances(version.id).await?;
            }

            RollbackImpact {
                function_unit_name: function_unit.to_string(),
                target_version: target,
                target_version_id: Some(found.id),
                versions_to_delete: to_delete.iter().map(|v| v.version).collect(),
                total_process_instances_to_delete: total,
                can_proceed: true,
                warning_message: Some(warning_message(to_delete.len(), total)),
                error_message: None,
            }
        },
    };

    Ok((assessment, impact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn version(minor: u32, is_active: bool) -> Version {
        Version {
            id: Uuid::new_v4(),
            function_unit_id: Uuid::nil(),
            version: SemanticVersion::new(1, minor, 0),
            change_log: None,
            snapshot: Vec::new(),
            published_by: "system".to_string(),
            published_at: Utc::now(),
            is_active,
            process_definition_key: format!("orders_v1.{}.0", minor),
        }
    }

    #[test]
    fn test_assess_collects_newer_versions_oldest_first() {
        let versions = vec![version(2, true), version(1, false), version(0, false)];
        match assess("orders", versions, &SemanticVersion::new(1, 0, 0)) {
            Assessment::Proceed { target, to_delete } => {
                assert_eq!(target.version, SemanticVersion::new(1, 0, 0));
                let numbers: Vec<String> = to_delete.iter().map(|v| v.version.to_string()).collect();
                assert_eq!(numbers, vec!["1.1.0", "1.2.0"]);
            },
            other => panic!("expected Proceed, got {:?}", other),
        }
    }

    #[test]
    fn test_assess_rejects_missing_and_active_targets() {
        let versions = vec![version(1, true), version(0, false)];

        assert!(matches!(
            assess("orders", versions.clone(), &SemanticVersion::new(9, 0, 0)),
            Assessment::Rejected(VersionValidationError::RollbackVersionNotFound { .. })
        ));
        assert!(matches!(
            assess("orders", versions, &SemanticVersion::new(1, 1, 0)),
            Assessment::Rejected(VersionValidationError::RollbackToActiveVersion(_))
        ));
    }

    #[test]
    fn test_warning_message() {
        assert_eq!(
            warning_message(2, 5),
            "WARNING: This rollback operation will DELETE 2 version(s) and 5 process instance(s). \
             This action is IRREVERSIBLE. Please confirm you want to proceed."
        );
    }
}
