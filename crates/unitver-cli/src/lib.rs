//! unitver CLI library
//!
//! Command-line client for the function-unit versioning server.
//!
//! # Overview
//!
//! - **Deploy**: publish a snapshot file as the next version (`unitver deploy`)
//! - **Inspect**: list units, show history and the active version
//!   (`unitver units`, `unitver history`, `unitver active`)
//! - **Export**: write a stored snapshot back to disk (`unitver export`)
//! - **Rollback**: review the impact, confirm, then roll back
//!   (`unitver plan`, `unitver rollback`)
//! - **Check**: report invariant violations (`unitver check`)

pub mod api;
pub mod commands;
pub mod error;

// Re-export commonly used types
pub use error::{CliError, Result};

use clap::{Parser, Subcommand, ValueEnum};

/// unitver - versioned function-unit deployment and rollback
#[derive(Parser, Debug)]
#[command(name = "unitver")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Server URL
    #[arg(long, env = "UNITVER_SERVER_URL", default_value = "http://localhost:8000", global = true)]
    pub server_url: String,
}

/// Output format for listings
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a snapshot as the next version of a function unit
    Deploy {
        /// Function unit name
        name: String,

        /// Path to the snapshot file (sent verbatim)
        #[arg(short, long)]
        snapshot_file: String,

        /// Change type: major, minor or patch
        #[arg(short, long)]
        change_type: String,

        /// Free-text description of the change
        #[arg(long)]
        change_log: Option<String>,

        /// Publisher recorded on the version
        #[arg(long)]
        published_by: Option<String>,
    },

    /// Show the version history of a function unit
    History {
        /// Function unit name
        name: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Show the active version of a function unit
    Active {
        /// Function unit name
        name: String,
    },

    /// List function units
    Units,

    /// Write the snapshot of a version to a file
    Export {
        /// Function unit name
        name: String,

        /// Version to export (MAJOR.MINOR.PATCH)
        version: String,

        /// Output file path
        #[arg(short, long)]
        output: String,
    },

    /// Show what a rollback would delete
    Plan {
        /// Function unit name
        name: String,

        /// Target version (MAJOR.MINOR.PATCH)
        target: String,
    },

    /// Roll back to an earlier version, deleting every newer version
    Rollback {
        /// Function unit name
        name: String,

        /// Target version (MAJOR.MINOR.PATCH)
        target: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check consistency invariants
    Check {
        /// Function unit name (all units when omitted)
        name: Option<String>,
    },
}
