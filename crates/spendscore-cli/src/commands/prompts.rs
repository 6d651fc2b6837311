//! Prompts-related command implementations

use anyhow::Result;
use spendscore_core::prompts::{default_prompts_dir, PromptId, PromptLibrary};

/// Show the recommendation prompt and whether it is overridden
pub fn cmd_prompts_show() -> Result<()> {
    let mut library = PromptLibrary::new();
    let prompt = library.get(PromptId::SpendRecommendations)?;

    println!("Prompt: {}", prompt.metadata.id);
    println!("Version: {}", prompt.metadata.version);
    println!("Task Type: {}", prompt.metadata.task_type);
    println!(
        "Source: {}",
        if prompt.is_override() {
            "Override"
        } else {
            "Default"
        }
    );

    if let Some(ref path) = prompt.override_path {
        println!("Override Path: {}", path.display());
    }

    println!();
    println!("--- Content ---");
    println!("{}", prompt.content);

    Ok(())
}

/// Show the path where prompt overrides should be placed
pub fn cmd_prompts_path() -> Result<()> {
    match default_prompts_dir() {
        Some(path) => {
            println!("{}", path.display());

            if !path.exists() {
                eprintln!();
                eprintln!("Note: This directory does not exist yet.");
                eprintln!(
                    "Create it and add {}.md to customize recommendations.",
                    PromptId::SpendRecommendations.as_str()
                );
            }
        }
        None => {
            eprintln!("Could not determine prompts directory.");
            eprintln!("The data directory is not available on this system.");
        }
    }

    Ok(())
}
