pub mod check_invariants;
pub mod export_snapshot;
pub mod get_active;
pub mod history;
pub mod list;
pub mod plan_rollback;

pub use check_invariants::{
    CheckInvariantsError, CheckInvariantsQuery, InvariantReport, InvariantViolation,
};
pub use export_snapshot::{ExportSnapshotError, ExportSnapshotQuery, ExportSnapshotResponse};
pub use get_active::{ActiveVersionResponse, GetActiveVersionError, GetActiveVersionQuery};
pub use history::{
    VersionHistoryEntry, VersionHistoryError, VersionHistoryQuery, VersionHistoryResponse,
};
pub use list::{ListFunctionUnitsError, ListFunctionUnitsQuery, ListFunctionUnitsResponse};
pub use plan_rollback::{PlanRollbackError, PlanRollbackQuery};
