//! unitver common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types and utilities for the function-unit versioning workspace.
//!
//! # Overview
//!
//! - **Types**: [`SemanticVersion`] and [`ChangeType`], the value types every
//!   deploy and rollback is expressed in
//! - **Snapshot encoding**: base64 transport helpers for opaque snapshot blobs
//! - **Logging**: centralized `tracing` setup used by the server and the CLI
//!
//! # Example
//!
//! ```
//! use unitver_common::{ChangeType, SemanticVersion};
//!
//! let current: SemanticVersion = "1.4.2".parse().unwrap();
//! let next = current.bump("minor".parse::<ChangeType>().unwrap());
//! assert_eq!(next.to_string(), "1.5.0");
//! ```

pub mod error;
pub mod logging;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use error::{Result, UnitverError};
pub use types::{ChangeType, SemanticVersion};
