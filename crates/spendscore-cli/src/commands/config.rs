//! Configuration commands

use std::path::Path;

use anyhow::{Context, Result};
use spendscore_core::config::default_config_path;
use spendscore_core::ScoringConfig;

use super::load_config;

/// Print the effective configuration and where it came from
pub fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;

    let source = match path {
        Some(path) => path.display().to_string(),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(override_path) => override_path.display().to_string(),
            None => "built-in defaults".to_string(),
        },
    };

    println!("# Source: {}", source);
    println!("{}", config.to_toml_string()?);

    Ok(())
}

/// Show the path where a config override should be placed
pub fn cmd_config_path() -> Result<()> {
    match default_config_path() {
        Some(path) => {
            println!("{}", path.display());

            if !path.exists() {
                eprintln!();
                eprintln!("Note: No override exists yet; built-in defaults are in use.");
                eprintln!("Run `spendscore config show` and save the output there to customize.");
            }
        }
        None => {
            eprintln!("Could not determine config directory.");
            eprintln!("The data directory is not available on this system.");
        }
    }

    Ok(())
}

/// Load and validate a configuration file
pub fn cmd_config_validate(file: &Path) -> Result<()> {
    let config = ScoringConfig::from_path(file)
        .with_context(|| format!("{} is not a valid configuration", file.display()))?;

    println!("✓ {} is valid", file.display());
    println!(
        "  weights: {}% across 6 metrics",
        config.weights.total()
    );
    println!(
        "  tiers: green >= {}, amber >= {}",
        config.tiers.green, config.tiers.amber
    );
    println!("  benchmarks: {} categories", config.benchmarks.len());
    println!(
        "  industry: {}",
        config.industry.map_or("none", |industry| industry.as_str())
    );

    Ok(())
}
