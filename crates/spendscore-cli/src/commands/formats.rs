//! Layout detection commands

use std::path::Path;

use anyhow::{Context, Result};
use spendscore_core::formats::column_index;
use spendscore_core::{Field, FormatDetector, Layout};

use super::load_table;

/// Show which layout an export matches and how its columns map
pub fn cmd_detect(file: &Path) -> Result<()> {
    let table = load_table(file)?;
    let detection = FormatDetector::new()
        .detect(&table.headers)
        .with_context(|| format!("Could not detect the layout of {}", file.display()))?;

    println!("File: {}", file.display());
    println!("Layout: {}", detection.layout.name());
    println!("Method: {}", detection.method.as_str());
    println!("Confidence: {:.2}", detection.confidence);
    println!("Rows: {}", table.len());
    println!();

    println!("{:<12} {}", "FIELD", "COLUMN");
    println!("{}", "-".repeat(40));
    for field in Field::all() {
        let column = match detection.mapping.get(*field) {
            Some(column) => match column_index(&table.headers, column) {
                Some(index) => format!("{} (#{})", table.headers[index], index),
                None => column.to_string(),
            },
            None if field.is_mandatory() => "(missing)".to_string(),
            None => "-".to_string(),
        };
        println!("{:<12} {}", field.as_str(), column);
    }

    Ok(())
}

/// List the layout registry in detection order
pub fn cmd_formats() -> Result<()> {
    println!("Supported layouts (checked in this order):\n");

    for layout in Layout::registry() {
        println!("{}", layout.name());
        for field in Field::all() {
            let aliases = layout.aliases(*field);
            if aliases.is_empty() {
                continue;
            }
            let required = if layout.required().contains(field) {
                " (required)"
            } else {
                ""
            };
            println!(
                "  {:<12} {}{}",
                field.as_str(),
                aliases.join(", "),
                required
            );
        }
        println!();
    }

    println!("Headers matching no layout fall back to keyword matching.");
    println!("Use `analyze --map FIELD=COLUMN` or `--mapping FILE` to bypass detection.");

    Ok(())
}
