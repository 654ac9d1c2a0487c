//! Feature modules implementing the versioning API
//!
//! Each feature is a vertical slice following the CQRS pattern:
//! - `commands/` - Write operations (deploy, rollback, start process)
//! - `queries/` - Read operations (history, active version, rollback plan)
//! - `routes.rs` - HTTP route definitions
//!
//! Commands and queries implement the mediator `Request` trait so they can be
//! dispatched through [`crate::cqrs::build_mediator`] as well as called
//! directly from routes.

pub mod function_units;
pub mod shared;

use axum::Router;

use crate::config::VersioningConfig;
use crate::db::SharedStore;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Version store backing every command and query
    pub store: SharedStore,
    /// Snapshot limit and retry policy for the mutating routes
    pub versioning: VersioningConfig,
}

/// Creates the API router with all feature routes mounted
///
/// - `/function-units` - Versioning, rollback and process start
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().nest(
        "/function-units",
        function_units::function_units_routes().with_state(state),
    )
}
