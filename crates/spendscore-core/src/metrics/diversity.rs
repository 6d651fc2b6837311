//! Category Diversity - Shannon entropy of spend across categories

use super::stats::{round2, shannon_entropy};
use super::{indices_by_category, Metric, MetricContext, MetricScore};
use crate::error::Result;
use crate::models::{Evidence, MetricKind};

pub struct CategoryDiversityMetric;

impl Metric for CategoryDiversityMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::CategoryDiversity
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricScore> {
        let groups = indices_by_category(ctx.transactions);
        let k = groups.len();

        let mut evidence = vec![Evidence::stat("category_count", k as f64)];
        if k <= 1 {
            evidence.push(Evidence::note("All spend is in a single category"));
            return Ok(MetricScore::new(0.0, evidence));
        }

        // Fall back to transaction counts when there is no spend to weigh
        let use_counts = ctx.total_spend() <= 0.0;
        let weights: Vec<f64> = groups
            .values()
            .map(|indices| {
                if use_counts {
                    indices.len() as f64
                } else {
                    indices.iter().map(|i| ctx.transactions[*i].spend()).sum()
                }
            })
            .collect();
        if use_counts {
            evidence.push(Evidence::note(
                "Total spend is zero; shares use transaction counts",
            ));
        }

        let entropy = shannon_entropy(&weights);
        let max_entropy = (k as f64).log2();
        evidence.push(Evidence::stat("entropy", round2(entropy)));
        evidence.push(Evidence::stat("max_entropy", round2(max_entropy)));

        Ok(MetricScore::new(entropy / max_entropy * 100.0, evidence))
    }
}
