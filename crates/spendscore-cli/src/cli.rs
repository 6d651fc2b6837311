//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use spendscore_core::Industry;

/// SpendScore - Expense health scoring for accounting exports
#[derive(Parser)]
#[command(name = "spendscore")]
#[command(about = "Score the health of an expense export", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Scoring configuration file (default: data-dir override, then built-in)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score a CSV or JSON export
    Analyze {
        /// Export file (.csv or .json)
        #[arg(short, long)]
        file: PathBuf,

        /// Column mapping file (TOML, e.g. `date = "Posted"`, `amount = 2`)
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Map a field to a column, overriding detection (repeatable)
        ///
        /// Columns are header names, or `#N` for a zero-based index.
        #[arg(long = "map", value_name = "FIELD=COLUMN")]
        map: Vec<String>,

        /// Benchmark table (TOML, category = expected share)
        ///
        /// Entries override the configured benchmarks and industry preset.
        #[arg(long)]
        benchmarks: Option<PathBuf>,

        /// Industry benchmark preset (technology, professional_services, general)
        #[arg(long)]
        industry: Option<Industry>,

        /// Classification table (TOML, essential/discretionary lists)
        #[arg(long)]
        classification: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to a file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Add three recommendations (uses AI_BACKEND when set)
        #[arg(long)]
        recommend: bool,
    },

    /// Show the detected layout and column mapping of an export
    Detect {
        /// Export file (.csv or .json)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List supported export layouts and their header aliases
    Formats,

    /// Scoring configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Recommendation prompt
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Show the path where a config override should be placed
    Path,

    /// Check a configuration file without scoring anything
    Validate {
        /// Configuration file to check
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// Show the recommendation prompt and its source
    Show,

    /// Show the path where prompt overrides should be placed
    Path,
}
