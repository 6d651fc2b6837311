//! Spike Detection - outlier amounts within a category
//!
//! Categories with enough transactions use a population threshold of
//! `mean + multiplier * stddev` on spend magnitude. Small categories flag
//! their single largest transaction when it is strictly larger than every
//! other one. Categories below the minimum size are skipped. The score is
//! `100 - flagged spend / total spend * 100`.

use super::stats::{mean, population_stddev, round2};
use super::{indices_by_category, Metric, MetricContext, MetricScore};
use crate::error::Result;
use crate::models::{Evidence, FlaggedTransaction, MetricKind};

pub struct SpikeDetectionMetric;

impl Metric for SpikeDetectionMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::SpikeDetection
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricScore> {
        let transactions = ctx.transactions;
        let thresholds = ctx.thresholds;
        let mut flagged: Vec<FlaggedTransaction> = Vec::new();
        let mut skipped = 0usize;

        for indices in indices_by_category(transactions).values() {
            if indices.len() < thresholds.min_category_size {
                skipped += 1;
                continue;
            }

            let spends: Vec<f64> = indices.iter().map(|i| transactions[*i].spend()).collect();

            if indices.len() < thresholds.small_category_size {
                if let Some(pos) = strictly_largest(&spends) {
                    let i = indices[pos];
                    flagged.push(FlaggedTransaction::new(
                        i,
                        &transactions[i],
                        format!(
                            "Largest of {} transactions in a small category",
                            indices.len()
                        ),
                    ));
                }
                continue;
            }

            let threshold =
                mean(&spends) + thresholds.spike_stddev_multiplier * population_stddev(&spends);
            for (pos, spend) in spends.iter().enumerate() {
                if *spend > threshold {
                    let i = indices[pos];
                    flagged.push(FlaggedTransaction::new(
                        i,
                        &transactions[i],
                        format!(
                            "Amount {:.2} exceeds category threshold {:.2}",
                            spend, threshold
                        ),
                    ));
                }
            }
        }

        flagged.sort_by_key(|f| f.index);
        let total_spend = ctx.total_spend();
        let flagged_spend: f64 = flagged.iter().map(|f| f.amount.abs()).sum();
        let ratio = if total_spend > 0.0 {
            flagged_spend / total_spend
        } else {
            0.0
        };

        let mut evidence = vec![
            Evidence::stat("spike_count", flagged.len() as f64),
            Evidence::stat("spike_spend", round2(flagged_spend)),
            Evidence::stat("spike_share", round2(ratio)),
        ];
        if skipped > 0 {
            evidence.push(Evidence::note(format!(
                "{} categor{} too small to assess",
                skipped,
                if skipped == 1 { "y" } else { "ies" }
            )));
        }
        evidence.extend(flagged.into_iter().map(Evidence::Flagged));

        Ok(MetricScore::new(100.0 - ratio * 100.0, evidence))
    }
}

/// Position of the maximum when it is strictly greater than all other values
fn strictly_largest(values: &[f64]) -> Option<usize> {
    let (pos, max) = values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    let ties = values.iter().filter(|v| *v >= max).count();
    (ties == 1).then_some(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricThresholds;
    use crate::metrics::test_support::tx;
    use crate::models::Transaction;
    use crate::providers::ClassificationTable;

    fn run(transactions: &[Transaction]) -> MetricScore {
        let thresholds = MetricThresholds::default();
        let classification = ClassificationTable::standard();
        let ctx = MetricContext::new(transactions, &thresholds, None, &classification);
        SpikeDetectionMetric.compute(&ctx).unwrap()
    }

    fn flagged_indices(result: &MetricScore) -> Vec<usize> {
        result
            .evidence
            .iter()
            .filter_map(Evidence::as_flagged)
            .map(|f| f.index)
            .collect()
    }

    #[test]
    fn test_single_spike_in_category() {
        // Nine 10.00 charges and one 100.00: mean 19, stddev 27, threshold 73
        let mut transactions: Vec<Transaction> = (1..=9)
            .map(|d| tx(&format!("2024-01-{:02}", d), "Cafe", -10.0, "Dining"))
            .collect();
        transactions.insert(4, tx("2024-01-20", "Steakhouse", -100.0, "Dining"));

        let result = run(&transactions);
        assert_eq!(flagged_indices(&result), vec![4]);
        assert!((result.score - (100.0 - 100.0 / 190.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_uniform_amounts_have_no_spikes() {
        let transactions: Vec<Transaction> = (1..=6)
            .map(|d| tx(&format!("2024-01-{:02}", d), "Cafe", -10.0, "Dining"))
            .collect();
        let result = run(&transactions);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_small_category_flags_strict_maximum() {
        let transactions = vec![
            tx("2024-01-01", "Hotel", -300.0, "Travel"),
            tx("2024-01-02", "Taxi", -40.0, "Travel"),
            tx("2024-01-03", "Train", -60.0, "Travel"),
        ];
        let result = run(&transactions);
        assert_eq!(flagged_indices(&result), vec![0]);
        assert!((result.score - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_category_tie_flags_nothing() {
        let transactions = vec![
            tx("2024-01-01", "Hotel", -300.0, "Travel"),
            tx("2024-01-02", "Hotel", -300.0, "Travel"),
            tx("2024-01-03", "Taxi", -40.0, "Travel"),
        ];
        assert!(flagged_indices(&run(&transactions)).is_empty());
    }

    #[test]
    fn test_single_transaction_category_skipped() {
        let transactions = vec![
            tx("2024-01-01", "Laptop", -2500.0, "Equipment"),
            tx("2024-01-02", "Cafe", -10.0, "Dining"),
            tx("2024-01-03", "Cafe", -10.0, "Dining"),
        ];
        let result = run(&transactions);
        assert!(flagged_indices(&result).is_empty());
        assert!(result
            .evidence
            .contains(&Evidence::note("1 category too small to assess")));
    }

    #[test]
    fn test_sign_is_ignored() {
        let transactions = vec![
            tx("2024-01-01", "Refund", 10.0, "Dining"),
            tx("2024-01-02", "Cafe", -10.0, "Dining"),
            tx("2024-01-03", "Cafe", -10.0, "Dining"),
        ];
        assert!(flagged_indices(&run(&transactions)).is_empty());
    }

    #[test]
    fn test_strictly_largest() {
        assert_eq!(strictly_largest(&[1.0, 5.0, 3.0]), Some(1));
        assert_eq!(strictly_largest(&[5.0, 5.0, 3.0]), None);
        assert_eq!(strictly_largest(&[]), None);
    }
}
