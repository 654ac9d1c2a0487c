//! Function unit versioning
//!
//! Vertical slice for deploying, inspecting and rolling back the versions of
//! a function unit, plus starting process instances against the active
//! version.
//!
//! - `commands/` - deploy, rollback, start process instance
//! - `queries/` - list, history, active version, rollback plan, snapshot export,
//!   invariant checks
//! - [`impact`] - rollback target assessment shared by the plan query and the
//!   rollback command
//! - [`invariants`] - consistency checks run before every commit

pub mod commands;
pub mod impact;
pub mod invariants;
pub mod queries;
pub mod routes;

pub use commands::{
    DeployCommand, DeployError, DeployResponse, RollbackCommand, RollbackError, RollbackOutcome,
    RollbackResponse, StartProcessCommand, StartProcessError, StartProcessResponse,
};
pub use impact::RollbackImpact;
pub use routes::function_units_routes;
