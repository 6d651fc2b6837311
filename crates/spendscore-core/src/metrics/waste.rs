//! Waste Ratio - share of spend in discretionary categories
//!
//! Categories are looked up in the classification table; anything the table
//! does not know is treated as discretionary.

use std::collections::BTreeSet;

use super::stats::round2;
use super::{Metric, MetricContext, MetricScore};
use crate::error::Result;
use crate::models::{Essentiality, Evidence, MetricKind};

pub struct WasteRatioMetric;

impl Metric for WasteRatioMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::WasteRatio
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricScore> {
        let total = ctx.total_spend();
        if total <= 0.0 {
            return Ok(MetricScore::new(
                100.0,
                vec![Evidence::note("No spend to classify")],
            ));
        }

        let mut essential = 0.0;
        let mut discretionary = 0.0;
        let mut unclassified: BTreeSet<String> = BTreeSet::new();

        for tx in ctx.transactions {
            match ctx.classification.classify(&tx.category) {
                Some(Essentiality::Essential) => essential += tx.spend(),
                Some(Essentiality::Discretionary) => discretionary += tx.spend(),
                None => {
                    discretionary += tx.spend();
                    unclassified.insert(tx.category.trim().to_string());
                }
            }
        }

        let ratio = discretionary / total;
        let mut evidence = vec![
            Evidence::stat("essential_spend", round2(essential)),
            Evidence::stat("discretionary_spend", round2(discretionary)),
            Evidence::stat("discretionary_share", round2(ratio)),
        ];
        if !unclassified.is_empty() {
            evidence.push(Evidence::note(format!(
                "Unclassified categories counted as discretionary: {}",
                unclassified.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }

        Ok(MetricScore::new(100.0 - ratio * 100.0, evidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricThresholds;
    use crate::metrics::test_support::tx;
    use crate::models::Transaction;
    use crate::providers::ClassificationTable;

    fn run(transactions: &[Transaction], table: &ClassificationTable) -> MetricScore {
        let thresholds = MetricThresholds::default();
        let ctx = MetricContext::new(transactions, &thresholds, None, table);
        WasteRatioMetric.compute(&ctx).unwrap()
    }

    #[test]
    fn test_all_essential_scores_full() {
        let transactions = vec![
            tx("2024-01-01", "Landlord", -1200.0, "Rent"),
            tx("2024-01-02", "Power Co", -90.0, "UTILITIES"),
            tx("2024-01-03", "Market", -150.0, "groceries"),
        ];
        assert_eq!(run(&transactions, &ClassificationTable::standard()).score, 100.0);
    }

    #[test]
    fn test_discretionary_share() {
        let transactions = vec![
            tx("2024-01-01", "Landlord", -750.0, "Rent"),
            tx("2024-01-02", "Bistro", -150.0, "Dining"),
            tx("2024-01-03", "Arcade", -100.0, "Gaming"),
        ];
        let result = run(&transactions, &ClassificationTable::standard());
        assert!((result.score - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_unclassified_counts_as_discretionary() {
        let transactions = vec![
            tx("2024-01-01", "Landlord", -500.0, "Rent"),
            tx("2024-01-02", "Paper", -500.0, "Office Supplies"),
            tx("2024-01-03", "Landlord", 0.0, "Rent"),
        ];
        let result = run(&transactions, &ClassificationTable::standard());
        assert!((result.score - 50.0).abs() < 1e-9);
        assert!(result.evidence.contains(&Evidence::note(
            "Unclassified categories counted as discretionary: Office Supplies"
        )));
    }

    #[test]
    fn test_empty_table_treats_everything_as_discretionary() {
        let transactions = vec![
            tx("2024-01-01", "Landlord", -500.0, "Rent"),
            tx("2024-01-02", "Market", -500.0, "Groceries"),
            tx("2024-01-03", "Fuel", -50.0, "Fuel"),
        ];
        assert_eq!(run(&transactions, &ClassificationTable::new()).score, 0.0);
    }

    #[test]
    fn test_zero_spend_scores_full() {
        let transactions = vec![
            tx("2024-01-01", "A", 0.0, "Dining"),
            tx("2024-01-02", "B", 0.0, "Dining"),
            tx("2024-01-03", "C", 0.0, "Dining"),
        ];
        assert_eq!(run(&transactions, &ClassificationTable::standard()).score, 100.0);
    }
}
