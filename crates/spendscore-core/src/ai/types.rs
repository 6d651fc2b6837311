//! Request and response types for recommendation generation

use serde::{Deserialize, Serialize};

use crate::models::{Evidence, MetricResult, SpendScoreReport, SummaryStats, Tier};

/// Maximum evidence lines carried per metric into a prompt
const MAX_HIGHLIGHTS: usize = 5;

/// Structured findings sent to the text-generation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub overall_score: u32,
    pub tier: Tier,
    pub tier_label: String,
    /// The lowest-scoring metrics, weakest first
    pub weakest: Vec<MetricFinding>,
    pub summary: SummaryStats,
}

impl RecommendationRequest {
    /// Build a request from the `n` lowest-scoring metrics of a report
    pub fn from_report(report: &SpendScoreReport, n: usize) -> Self {
        Self {
            overall_score: report.overall_score,
            tier: report.tier,
            tier_label: report.tier.label().to_string(),
            weakest: report
                .lowest_metrics(n)
                .into_iter()
                .map(MetricFinding::from_result)
                .collect(),
            summary: report.summary_stats.clone(),
        }
    }

    /// One line per finding, for prompt interpolation
    pub fn findings_text(&self) -> String {
        self.weakest
            .iter()
            .map(|f| {
                let mut line = format!("- {} ({:.1}/100)", f.name, f.score);
                if !f.highlights.is_empty() {
                    line.push_str(": ");
                    line.push_str(&f.highlights.join("; "));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One weak metric with a compact rendering of its evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFinding {
    pub metric: String,
    pub name: String,
    pub score: f64,
    pub highlights: Vec<String>,
}

impl MetricFinding {
    pub fn from_result(result: &MetricResult) -> Self {
        let highlights = result
            .evidence
            .iter()
            .take(MAX_HIGHLIGHTS)
            .map(|e| match e {
                Evidence::Stat { label, value } => format!("{} = {:.2}", label, value),
                Evidence::Flagged(f) => format!(
                    "{} {} {:.2} ({})",
                    f.date, f.vendor, f.amount, f.reason
                ),
                Evidence::Note { text } => text.clone(),
            })
            .collect();

        Self {
            metric: result.kind.as_str().to_string(),
            name: result.name.clone(),
            score: result.score,
            highlights,
        }
    }
}

/// JSON shape expected back from the backend
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionList {
    pub suggestions: Vec<RawSuggestion>,
}

/// A suggestion before its priority has been validated
#[derive(Debug, Clone, Deserialize)]
pub struct RawSuggestion {
    pub priority: String,
    pub text: String,
}
