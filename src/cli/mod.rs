//! CLI commands for kith.

pub mod exec;
pub mod export;
pub mod import;
pub mod init;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// kith - local-first relationship tracker storage
#[derive(Parser)]
#[command(name = "kith")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to ~/.kith/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the schema and seed the local profile
    Init,

    /// Export every table as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Import rows from an export JSON file
    Import {
        /// JSON file path
        file: PathBuf,
    },

    /// Run a SQL script, continuing past failing statements
    Exec {
        /// SQL file path
        file: PathBuf,

        /// Stop and roll back on the first failing statement
        #[arg(long)]
        strict: bool,
    },

    /// Show schema version and row counts
    Status,
}
