//! unitver server library
//!
//! HTTP server for versioned function-unit deployment and rollback.
//!
//! # Overview
//!
//! A function unit is a named, independently deployable bundle whose
//! definition is stored as an opaque snapshot. Every deploy appends an
//! immutable, semantically versioned record and makes it the single active
//! version; process instances bind to whichever version is active when they
//! start. A rollback is two-phase: the caller first sees which versions and
//! process instances would be deleted, then confirms.
//!
//! # Architecture
//!
//! The server follows a **CQRS (Command Query Responsibility Segregation)** layout:
//!
//! - **Commands** (write operations): deploy, rollback, start process instance.
//!   Each runs under an exclusive per-unit lock, verifies the unit's invariants
//!   and commits atomically.
//! - **Queries** (read operations): list units, version history, active version,
//!   rollback plan, snapshot export, invariant report.
//!
//! Persistence sits behind [`db::VersionStore`], implemented for PostgreSQL
//! (row locks via `SELECT ... FOR UPDATE`) and in memory.
//!
//! ## Framework Stack
//!
//! - **Axum**: HTTP routing and extractors
//! - **SQLx**: PostgreSQL access and migrations
//! - **Tower**: Middleware (tracing, CORS, compression)
//!
//! # Example
//!
//! ```no_run
//! use unitver_server::{api, config::Config, db};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let store = db::open_store(&config).await?;
//!     api::serve(store, &config, std::future::pending()).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod cqrs;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;
pub mod models;

// Re-export commonly used types
pub use error::{StateError, TransactionError, VersionValidationError};
