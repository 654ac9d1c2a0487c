pub use mediator::DefaultAsyncMediator;

use crate::config::VersioningConfig;
use crate::db::SharedStore;
use crate::features::function_units::{commands, queries};

pub type AppMediator = DefaultAsyncMediator;

/// Registers every command and query handler.
///
/// Must be called inside a multi-thread Tokio runtime: handler registration
/// blocks in place on the current runtime handle and panics elsewhere.
pub fn build_mediator(store: SharedStore, versioning: VersioningConfig) -> AppMediator {
    let max_snapshot_bytes = versioning.max_snapshot_bytes;

    DefaultAsyncMediator::builder()
        // Commands
        .add_handler({
            let store = store.clone();
            move |cmd| {
                let store = store.clone();
                async move { commands::deploy::handle(store, max_snapshot_bytes, cmd).await }
            }
        })
        .add_handler({
            let store = store.clone();
            move |cmd| {
                let store = store.clone();
                async move { commands::rollback::handle(store, cmd).await }
            }
        })
        .add_handler({
            let store = store.clone();
            move |cmd| {
                let store = store.clone();
                async move { commands::start_process::handle(store, cmd).await }
            }
        })
        // Queries
        .add_handler({
            let store = store.clone();
            move |query| {
                let store = store.clone();
                async move { queries::list::handle(store, query).await }
            }
        })
        .add_handler({
            let store = store.clone();
            move |query| {
                let store = store.clone();
                async move { queries::history::handle(store, query).await }
            }
        })
        .add_handler({
            let store = store.clone();
            move |query| {
                let store = store.clone();
                async move { queries::get_active::handle(store, query).await }
            }
        })
        .add_handler({
            let store = store.clone();
            move |query| {
                let store = store.clone();
                async move { queries::plan_rollback::handle(store, query).await }
            }
        })
        .add_handler({
            let store = store.clone();
            move |query| {
                let store = store.clone();
                async move { queries::export_snapshot::handle(store, query).await }
            }
        })
        .add_handler({
            let store = store.clone();
            move |query| {
                let store = store.clone();
                async move { queries::check_invariants::handle(store, query).await }
            }
        })
        .build()
}
