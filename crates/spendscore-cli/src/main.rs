//! SpendScore CLI - Expense health scorer
//!
//! Usage:
//!   spendscore analyze --file export.csv        Score an export
//!   spendscore analyze --file x.csv --json      Print the report as JSON
//!   spendscore detect --file export.csv         Show the detected layout
//!   spendscore formats                          List supported layouts

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Analyze {
            file,
            mapping,
            map,
            benchmarks,
            industry,
            classification,
            json,
            output,
            recommend,
        } => {
            let options = commands::AnalyzeOptions {
                file,
                config: cli.config.clone(),
                mapping,
                map,
                benchmarks,
                industry,
                classification,
                json,
                output,
                recommend,
            };
            commands::cmd_analyze(&options).await
        }
        Commands::Detect { file } => commands::cmd_detect(&file),
        Commands::Formats => commands::cmd_formats(),
        Commands::Config { action } => match action {
            None | Some(ConfigAction::Show) => commands::cmd_config_show(config),
            Some(ConfigAction::Path) => commands::cmd_config_path(),
            Some(ConfigAction::Validate { file }) => commands::cmd_config_validate(&file),
        },
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::Show) => commands::cmd_prompts_show(),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
    }
}
