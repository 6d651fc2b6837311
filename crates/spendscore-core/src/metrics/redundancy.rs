//! Redundancy Detection - duplicate charges and overlapping vendors
//!
//! Two kinds of redundancy are flagged:
//! - duplicate pairs: same vendor, same amount to the cent, dates within the
//!   configured window (inclusive); both members are flagged
//! - vendor clusters: several distinct vendor names in one category that share
//!   their first significant word (e.g. two streaming plans from one provider);
//!   every transaction in the cluster is flagged
//!
//! A transaction is counted once even when it matches both rules. The score is
//! `100 - flagged spend / total spend * 100`.

use std::collections::{BTreeMap, BTreeSet};

use super::stats::round2;
use super::{Metric, MetricContext, MetricScore};
use crate::error::Result;
use crate::import::vendor_key;
use crate::models::{Evidence, FlaggedTransaction, MetricKind};

/// Words that never identify a vendor on their own
const STOP_WORDS: &[&str] = &["THE", "AND", "INC", "LLC", "LTD", "CO", "CORP", "OF"];

pub struct RedundancyMetric;

impl Metric for RedundancyMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::Redundancy
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricScore> {
        let transactions = ctx.transactions;
        let total_spend = ctx.total_spend();
        if total_spend <= 0.0 {
            return Ok(MetricScore::new(
                100.0,
                vec![Evidence::note("No spend to check for redundancy")],
            ));
        }

        let mut flagged: BTreeMap<usize, String> = BTreeMap::new();

        // Duplicate pairs: group by (vendor, cents), then compare dates within the group
        let mut groups: BTreeMap<(String, i64), Vec<usize>> = BTreeMap::new();
        for (i, tx) in transactions.iter().enumerate() {
            groups
                .entry((vendor_key(&tx.vendor), tx.cents()))
                .or_default()
                .push(i);
        }

        let window = ctx.thresholds.duplicate_window_days;
        let mut duplicate_pairs = 0usize;
        for indices in groups.values().filter(|g| g.len() > 1) {
            for (pos, a) in indices.iter().enumerate() {
                for b in &indices[pos + 1..] {
                    let days = (transactions[*a].date - transactions[*b].date)
                        .num_days()
                        .abs();
                    if days <= window {
                        duplicate_pairs += 1;
                        let reason = format!(
                            "Possible duplicate: same vendor and amount within {} day(s)",
                            days
                        );
                        flagged.entry(*a).or_insert_with(|| reason.clone());
                        flagged.entry(*b).or_insert(reason);
                    }
                }
            }
        }

        // Vendor clusters: (category, first significant token) -> vendor keys and members
        let mut clusters: BTreeMap<(String, String), (BTreeSet<String>, Vec<usize>)> =
            BTreeMap::new();
        for (i, tx) in transactions.iter().enumerate() {
            let key = vendor_key(&tx.vendor);
            if let Some(token) = first_significant_token(&key) {
                let entry = clusters
                    .entry((tx.category_key(), token.to_string()))
                    .or_default();
                entry.0.insert(key.clone());
                entry.1.push(i);
            }
        }

        let mut cluster_count = 0usize;
        for ((_, token), (vendors, members)) in &clusters {
            if vendors.len() < 2 {
                continue;
            }
            cluster_count += 1;
            let names = vendors.iter().cloned().collect::<Vec<_>>().join(", ");
            for i in members {
                flagged.entry(*i).or_insert_with(|| {
                    format!("Overlapping {} vendors in one category: {}", token, names)
                });
            }
        }

        let flagged_spend: f64 = flagged.keys().map(|i| transactions[*i].spend()).sum();
        let ratio = flagged_spend / total_spend;
        let mut evidence = vec![
            Evidence::stat("duplicate_pairs", duplicate_pairs as f64),
            Evidence::stat("vendor_clusters", cluster_count as f64),
            Evidence::stat("flagged_count", flagged.len() as f64),
            Evidence::stat("flagged_spend", round2(flagged_spend)),
            Evidence::stat("flagged_share", round2(ratio)),
        ];
        evidence.extend(flagged.into_iter().map(|(i, reason)| {
            Evidence::Flagged(FlaggedTransaction::new(i, &transactions[i], reason))
        }));

        Ok(MetricScore::new(100.0 - ratio * 100.0, evidence))
    }
}

/// First word of a vendor key that is not a number or a stop word
fn first_significant_token(key: &str) -> Option<&str> {
    key.split_whitespace().find(|word| {
        word.len() >= 3
            && !word.chars().all(|c| c.is_ascii_digit())
            && !STOP_WORDS.contains(word)
    })
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
        RedundancyMetric.compute(&ctx).unwrap()
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
    fn test_no_redundancy_scores_full() {
        let transactions = vec![
            tx("2024-01-01", "Rent", -1000.0, "Rent"),
            tx("2024-01-05", "Market", -80.0, "Groceries"),
            tx("2024-01-09", "Cinema", -20.0, "Entertainment"),
        ];
        let result = run(&transactions);
        assert_eq!(result.score, 100.0);
        assert!(flagged_indices(&result).is_empty());
    }

    #[test]
    fn test_duplicate_pair_flags_both() {
        let transactions = vec![
            tx("2024-01-01", "Office Depot", -49.99, "Supplies"),
            tx("2024-01-03", "office depot", -49.99, "Supplies"),
            tx("2024-01-05", "Market", -80.0, "Groceries"),
            tx("2024-01-09", "Cinema", -20.0, "Entertainment"),
        ];
        // 99.98 of 199.98 flagged
        let result = run(&transactions);
        assert_eq!(flagged_indices(&result), vec![0, 1]);
        assert!((result.score - (100.0 - 99.98 / 199.98 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_window_is_inclusive() {
        let inside = vec![
            tx("2024-01-01", "Gym", -30.0, "Health"),
            tx("2024-01-04", "Gym", -30.0, "Health"),
            tx("2024-01-05", "Market", -80.0, "Groceries"),
        ];
        assert_eq!(flagged_indices(&run(&inside)), vec![0, 1]);

        let outside = vec![
            tx("2024-01-01", "Gym", -30.0, "Health"),
            tx("2024-01-05", "Gym", -30.0, "Health"),
            tx("2024-01-05", "Market", -80.0, "Groceries"),
        ];
        assert!(flagged_indices(&run(&outside)).is_empty());
    }

    #[test]
    fn test_different_cents_not_duplicate() {
        let transactions = vec![
            tx("2024-01-01", "Gym", -30.00, "Health"),
            tx("2024-01-02", "Gym", -30.01, "Health"),
            tx("2024-01-05", "Market", -80.0, "Groceries"),
        ];
        assert!(flagged_indices(&run(&transactions)).is_empty());
    }

    #[test]
    fn test_vendor_cluster_flags_all_members() {
        let transactions = vec![
            tx("2024-01-01", "Netflix Basic", -9.99, "Subscriptions"),
            tx("2024-01-10", "Netflix Premium", -19.99, "Subscriptions"),
            tx("2024-02-01", "Netflix Basic", -9.99, "Subscriptions"),
            tx("2024-01-05", "Netflix Gift", -39.97, "Gifts"),
        ];
        let result = run(&transactions);
        assert_eq!(flagged_indices(&result), vec![0, 1, 2]);
        assert!((result.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_vendor_name_is_not_a_cluster() {
        let transactions = vec![
            tx("2024-01-01", "Spotify", -9.99, "Subscriptions"),
            tx("2024-02-01", "Spotify", -9.99, "Subscriptions"),
            tx("2024-03-01", "Spotify", -9.99, "Subscriptions"),
        ];
        assert_eq!(run(&transactions).score, 100.0);
    }

    #[test]
    fn test_transaction_counted_once() {
        // Index 1 is both a duplicate of 0 and in the cluster with 2
        let transactions = vec![
            tx("2024-01-01", "Adobe Stock", -29.99, "Software"),
            tx("2024-01-02", "Adobe Stock", -29.99, "Software"),
            tx("2024-01-15", "Adobe Acrobat", -14.99, "Software"),
            tx("2024-01-20", "Market", -25.03, "Groceries"),
        ];
        let result = run(&transactions);
        assert_eq!(flagged_indices(&result), vec![0, 1, 2]);
        assert!((result.score - 25.03).abs() < 1e-9);
    }

    #[test]
    fn test_adding_duplicate_never_raises_score() {
        let mut transactions = vec![
            tx("2024-01-01", "Gym", -30.0, "Health"),
            tx("2024-01-05", "Market", -80.0, "Groceries"),
            tx("2024-01-09", "Cinema", -20.0, "Entertainment"),
            tx("2024-01-12", "Fuel Stop", -45.0, "Fuel"),
        ];
        let mut previous = run(&transactions).score;
        for _ in 0..3 {
            transactions.push(tx("2024-01-02", "Gym", -30.0, "Health"));
            let current = run(&transactions).score;
            assert!(current <= previous);
            previous = current;
        }
    }

    #[test]
    fn test_zero_spend_scores_full() {
        let transactions = vec![
            tx("2024-01-01", "Gym", 0.0, "Health"),
            tx("2024-01-01", "Gym", 0.0, "Health"),
            tx("2024-01-01", "Gym", 0.0, "Health"),
        ];
        assert_eq!(run(&transactions).score, 100.0);
    }

    #[test]
    fn test_first_significant_token() {
        assert_eq!(first_significant_token("THE HOME DEPOT 123"), Some("HOME"));
        assert_eq!(first_significant_token("7 ELEVEN"), Some("ELEVEN"));
        assert_eq!(first_significant_token("AB CD"), None);
    }
}
