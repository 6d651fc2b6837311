//! Budget Adherence - actual category shares against benchmark shares
//!
//! Deviation per category is `|actual - expected| / expected * 100`, and the
//! score is `100 - mean deviation`, floored at zero. Categories without a
//! positive benchmark are left out. When no benchmark covers any observed
//! category, every category is expected to take an equal share.

use super::stats::round2;
use super::{indices_by_category, Metric, MetricContext, MetricScore};
use crate::error::Result;
use crate::models::{Evidence, MetricKind};
use crate::providers::BenchmarkStatus;

pub struct BudgetAdherenceMetric;

impl Metric for BudgetAdherenceMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::BudgetAdherence
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricScore> {
        let groups = indices_by_category(ctx.transactions);
        let k = groups.len();
        let total = ctx.total_spend();
        let use_counts = total <= 0.0;

        // (display name, actual share, benchmark share if positive)
        let categories: Vec<(String, f64, Option<f64>)> = groups
            .values()
            .map(|indices| {
                let first = &ctx.transactions[indices[0]];
                let actual = if use_counts {
                    indices.len() as f64 / ctx.transactions.len() as f64
                } else {
                    indices.iter().map(|i| ctx.transactions[*i].spend()).sum::<f64>() / total
                };
                let expected = ctx
                    .benchmarks
                    .and_then(|b| b.expected_share(&first.category))
                    .filter(|share| *share > 0.0);
                (first.category.trim().to_string(), actual, expected)
            })
            .collect();

        let mut evidence = Vec::new();
        let covered = categories.iter().filter(|(_, _, e)| e.is_some()).count();

        let deviations: Vec<(String, f64)> = if covered == 0 {
            evidence.push(Evidence::note(format!(
                "No benchmarks for observed categories; assuming an equal share of {:.1}% each",
                100.0 / k as f64
            )));
            let expected = 1.0 / k as f64;
            categories
                .into_iter()
                .map(|(name, actual, _)| (name, deviation(actual, expected)))
                .collect()
        } else {
            let excluded: Vec<&str> = categories
                .iter()
                .filter(|(_, _, e)| e.is_none())
                .map(|(name, _, _)| name.as_str())
                .collect();
            if !excluded.is_empty() {
                evidence.push(Evidence::note(format!(
                    "No benchmark for: {}",
                    excluded.join(", ")
                )));
            }
            for (name, actual, _) in &categories {
                if let Some(range) = ctx.benchmarks.and_then(|b| b.expected_range(name)) {
                    evidence.push(Evidence::note(format!(
                        "{} is {} the benchmark range ({:.1}% vs {:.1}%-{:.1}%)",
                        name,
                        range_label(range.status(*actual)),
                        actual * 100.0,
                        range.min * 100.0,
                        range.max * 100.0
                    )));
                }
            }
            categories
                .iter()
                .filter_map(|(name, actual, expected)| {
                    expected.map(|e| (name.clone(), deviation(*actual, e)))
                })
                .collect()
        };

        let mean_deviation =
            deviations.iter().map(|(_, d)| d).sum::<f64>() / deviations.len() as f64;
        evidence.push(Evidence::stat("mean_deviation_pct", round2(mean_deviation)));
        for (name, dev) in &deviations {
            evidence.push(Evidence::stat(format!("deviation_pct:{}", name), round2(*dev)));
        }

        Ok(MetricScore::new((100.0 - mean_deviation).max(0.0), evidence))
    }
}

fn range_label(status: BenchmarkStatus) -> &'static str {
    match status {
        BenchmarkStatus::Optimal => "on target within",
        BenchmarkStatus::Good => "within",
        BenchmarkStatus::Under => "under",
        BenchmarkStatus::Over => "over",
    }
}

/// Relative deviation in percent
fn deviation(actual: f64, expected: f64) -> f64 {
    (actual - expected).abs() / expected * 100.0
}
