//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `analyze` - Score an export and print or write the report
//! - `formats` - Layout detection and the supported layout registry
//! - `config` - Effective configuration and override location
//! - `prompts` - Recommendation prompt and override location

pub mod analyze;
pub mod config;
pub mod formats;
pub mod prompts;

// Re-export command functions for main.rs
pub use analyze::*;
pub use config::*;
pub use formats::*;
pub use prompts::*;

use std::path::Path;

use anyhow::{Context, Result};
use spendscore_core::{RawTable, ScoringConfig};

/// Load the scoring configuration (explicit file, data-dir override, built-in)
pub fn load_config(path: Option<&Path>) -> Result<ScoringConfig> {
    match path {
        Some(path) => ScoringConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => ScoringConfig::load().context("Failed to load scoring config"),
    }
}

/// Read a CSV or JSON export
pub fn load_table(path: &Path) -> Result<RawTable> {
    RawTable::from_path(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
