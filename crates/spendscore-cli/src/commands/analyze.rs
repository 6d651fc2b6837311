//! Analyze command implementation

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use spendscore_core::{
    backend_from_env, Analysis, Analyzer, BenchmarkTable, ClassificationTable, ColumnMapping,
    ColumnRef, Field, Industry, Recommendation, RecommendationSource,
};
use tracing::info;

use super::{load_config, load_table, truncate};

/// Flagged transactions and rejected rows shown in text output
const LIST_LIMIT: usize = 10;

/// Options for `spendscore analyze`
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub file: PathBuf,
    pub config: Option<PathBuf>,
    pub mapping: Option<PathBuf>,
    pub map: Vec<String>,
    pub benchmarks: Option<PathBuf>,
    pub industry: Option<Industry>,
    pub classification: Option<PathBuf>,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub recommend: bool,
}

/// Score an export and print the report
pub async fn cmd_analyze(opts: &AnalyzeOptions) -> Result<()> {
    let mut config = load_config(opts.config.as_deref())?;
    if let Some(industry) = opts.industry {
        info!(industry = industry.as_str(), "Using industry benchmark preset");
        config.industry = Some(industry);
    }
    let table = load_table(&opts.file)?;
    let mapping = build_mapping(opts.mapping.as_deref(), &opts.map)?;

    let mut analyzer = Analyzer::new(config).context("Invalid scoring configuration")?;
    if let Some(path) = &opts.benchmarks {
        let overrides = BenchmarkTable::from_path(path)
            .with_context(|| format!("Failed to load benchmarks {}", path.display()))?;
        info!(categories = overrides.len(), "Loaded benchmark table");
        let mut benchmarks = analyzer.config().benchmark_table();
        benchmarks.merge(&overrides);
        analyzer = analyzer.with_benchmarks(Box::new(benchmarks));
    }
    if let Some(path) = &opts.classification {
        let classification = ClassificationTable::from_path(path)
            .with_context(|| format!("Failed to load classification {}", path.display()))?;
        info!(categories = classification.len(), "Loaded classification table");
        analyzer = analyzer.with_classification(Box::new(classification));
    }

    let analysis = analyzer
        .analyze(&table, mapping.as_ref())
        .with_context(|| format!("Failed to analyze {}", opts.file.display()))?;

    let recommendations = if opts.recommend {
        let backend = backend_from_env();
        Some(analyzer.recommend(&analysis.report, backend.as_deref()).await)
    } else {
        None
    };

    if opts.json || opts.output.is_some() {
        let json = report_json(&analysis, recommendations.as_deref())?;
        if let Some(path) = &opts.output {
            fs::write(path, &json)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            info!(path = %path.display(), "Wrote JSON report");
        }
        if opts.json {
            println!("{}", json);
        }
    }

    if !opts.json {
        print_report(&analysis, recommendations.as_deref());
    }

    Ok(())
}

/// Combine a mapping file with `FIELD=COLUMN` overrides
///
/// Returns `None` when nothing was supplied, so detection runs.
pub fn build_mapping(file: Option<&Path>, pairs: &[String]) -> Result<Option<ColumnMapping>> {
    let mut mapping = match file {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read mapping {}", path.display()))?;
            toml::from_str::<ColumnMapping>(&content)
                .with_context(|| format!("Invalid mapping file {}", path.display()))?
        }
        None => ColumnMapping::new(),
    };

    for pair in pairs {
        let (field, column) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid --map '{}', expected FIELD=COLUMN", pair))?;
        let field: Field = field.parse().map_err(|e: String| anyhow!(e))?;
        let column: ColumnRef = column.parse().map_err(|e: String| anyhow!(e))?;
        mapping.set(field, column);
    }

    Ok((!mapping.is_empty()).then_some(mapping))
}

/// Pretty JSON for an analysis, with recommendations when present
pub fn report_json(analysis: &Analysis, recommendations: Option<&[Recommendation]>) -> Result<String> {
    let mut value = serde_json::to_value(analysis)?;
    if let Some(recommendations) = recommendations {
        value["recommendations"] = serde_json::to_value(recommendations)?;
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

fn print_report(analysis: &Analysis, recommendations: Option<&[Recommendation]>) {
    let report = &analysis.report;
    let stats = &report.summary_stats;

    println!(
        "SpendScore: {}/100 ({})",
        report.overall_score,
        report.tier.label()
    );
    println!("Tier: {} - {}", report.tier, report.tier.description());
    println!(
        "Reward eligible: {}",
        if report.reward_eligible { "yes" } else { "no" }
    );
    println!();

    println!(
        "Layout: {} ({}, confidence {:.2})",
        analysis.detection.layout.name(),
        analysis.detection.method.as_str(),
        analysis.detection.confidence
    );
    println!(
        "Transactions: {} valid, {} rejected ({} to {})",
        stats.transaction_count, analysis.rejected_rows, stats.first_date, stats.last_date
    );
    println!(
        "Total: {:.2}  Mean: {:.2}  Median: {:.2}",
        stats.total_amount, stats.mean_amount, stats.median_amount
    );
    println!(
        "Categories: {}  Vendors: {}  Confidence: {:.2}",
        stats.category_count, stats.vendor_count, stats.confidence
    );
    if let Some(trend) = &stats.spend_trend {
        println!(
            "Trend: {} ({:+.2}/month over {} months), next month forecast {:.2}{}",
            trend.direction,
            trend.monthly_change,
            trend.months.len(),
            trend.next_month_forecast,
            if trend.significant_increase {
                "  (rising fast)"
            } else {
                ""
            }
        );
    }
    println!();

    println!("{:<24} {:>7} {:>7}", "METRIC", "SCORE", "WEIGHT");
    println!("{}", "-".repeat(40));
    for metric in &report.breakdown {
        println!(
            "{:<24} {:>7.1} {:>6}%{}",
            metric.name,
            metric.score,
            metric.weight,
            if metric.degraded { "  (default applied)" } else { "" }
        );
    }

    let flagged: Vec<_> = report
        .breakdown
        .iter()
        .flat_map(|m| m.flagged().map(move |f| (m, f)))
        .collect();
    if !flagged.is_empty() {
        println!();
        println!("Flagged transactions:");
        for (metric, f) in flagged.iter().take(LIST_LIMIT) {
            println!(
                "  {}  {:<28} {:>10.2}  {}: {}",
                f.date,
                truncate(&f.description, 28),
                f.amount,
                metric.name,
                f.reason
            );
        }
        if flagged.len() > LIST_LIMIT {
            println!("  ... and {} more", flagged.len() - LIST_LIMIT);
        }
    }

    if !analysis.rejections.is_empty() {
        println!();
        println!("Rejected rows:");
        for rejection in analysis.rejections.iter().take(LIST_LIMIT) {
            println!("  row {}: {}", rejection.row, rejection.reason);
        }
        if analysis.rejections.len() > LIST_LIMIT {
            println!("  ... and {} more", analysis.rejections.len() - LIST_LIMIT);
        }
    }

    if let Some(recommendations) = recommendations {
        println!();
        println!("Recommendations:");
        for rec in recommendations {
            let source = match rec.source {
                RecommendationSource::Generated => "",
                RecommendationSource::Fallback => " (built-in)",
            };
            println!("  [{}] {}{}", rec.priority, rec.text, source);
        }
    }

    println!();
    println!("Fingerprint: {}", analysis.fingerprint);
}
