//! Frequency Score - how evenly transactions are spread over time
//!
//! Transactions are bucketed by ISO week (Monday start), or by calendar month
//! once the date span exceeds the configured threshold. Every bucket between
//! the first and last transaction counts, including empty ones. The score
//! falls with the coefficient of variation of the bucket counts.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use super::stats::{mean, population_stddev, round2};
use super::{Metric, MetricContext, MetricScore};
use crate::error::{Error, Result};
use crate::models::{Evidence, MetricKind};

/// Bucket granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Week,
    Month,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Week => "week",
            Bucket::Month => "month",
        }
    }
}

pub struct FrequencyMetric;

impl Metric for FrequencyMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::Frequency
    }

    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricScore> {
        let dates: Vec<NaiveDate> = ctx.transactions.iter().map(|t| t.date).collect();
        let (first, last) = match (dates.iter().min(), dates.iter().max()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(Error::Metric("no transactions to bucket".into())),
        };

        let span_days = (last - first).num_days();
        let bucket = if span_days > ctx.thresholds.monthly_bucket_after_days {
            Bucket::Month
        } else {
            Bucket::Week
        };

        let counts = bucket_counts(&dates, first, last, bucket);
        let mut evidence = vec![
            Evidence::note(format!("Transactions bucketed by {}", bucket.as_str())),
            Evidence::stat("bucket_count", counts.len() as f64),
            Evidence::stat("span_days", span_days as f64),
        ];

        if counts.len() <= 1 {
            evidence.push(Evidence::note("All transactions fall in a single period"));
            return Ok(MetricScore::new(100.0, evidence));
        }

        let m = mean(&counts);
        let cv = population_stddev(&counts) / m;
        evidence.push(Evidence::stat("mean_per_bucket", round2(m)));
        evidence.push(Evidence::stat("coefficient_of_variation", round2(cv)));

        let score = 100.0 - (cv * 100.0).min(100.0);
        Ok(MetricScore::new(score, evidence))
    }
}

/// Monday of the ISO week containing `date`
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Months since year 0, for contiguous month indexing
pub(crate) fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

/// Transaction count per bucket, including empty buckets between first and last
pub fn bucket_counts(
    dates: &[NaiveDate],
    first: NaiveDate,
    last: NaiveDate,
    bucket: Bucket,
) -> Vec<f64> {
    let key = |d: NaiveDate| -> i64 {
        match bucket {
            Bucket::Week => week_start(d).num_days_from_ce() as i64 / 7,
            Bucket::Month => month_index(d),
        }
    };

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for k in key(first)..=key(last) {
        counts.insert(k, 0);
    }
    for date in dates {
        *counts.entry(key(*date)).or_insert(0) += 1;
    }

    counts.values().map(|c| *c as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricThresholds;
    use crate::metrics::test_support::tx;
    use crate::providers::ClassificationTable;

    fn score(transactions: &[crate::models::Transaction]) -> MetricScore {
        let thresholds = MetricThresholds::default();
        let classification = ClassificationTable::standard();
        let ctx = MetricContext::new(transactions, &thresholds, None, &classification);
        FrequencyMetric.compute(&ctx).unwrap()
    }

    #[test]
    fn test_single_bucket_is_perfect() {
        // Monday through Sunday of one ISO week
        let transactions = vec![
            tx("2024-01-01", "A", -10.0, "X"),
            tx("2024-01-03", "B", -10.0, "X"),
            tx("2024-01-07", "C", -10.0, "X"),
        ];
        assert_eq!(score(&transactions).score, 100.0);
    }

    #[test]
    fn test_even_weekly_spread() {
        let transactions = vec![
            tx("2024-01-01", "A", -10.0, "X"),
            tx("2024-01-08", "B", -10.0, "X"),
            tx("2024-01-15", "C", -10.0, "X"),
        ];
        assert_eq!(score(&transactions).score, 100.0);
    }

    #[test]
    fn test_empty_weeks_count() {
        // Weeks: 2, 0, 1 -> mean 1, population stddev sqrt(2/3)
        let transactions = vec![
            tx("2024-01-01", "A", -10.0, "X"),
            tx("2024-01-02", "B", -10.0, "X"),
            tx("2024-01-15", "C", -10.0, "X"),
        ];
        let result = score(&transactions);
        let expected = 100.0 - (2.0f64 / 3.0).sqrt() * 100.0;
        assert!((result.score - expected).abs() < 1e-9);
        assert!(result
            .evidence
            .contains(&Evidence::stat("bucket_count", 3.0)));
    }

    #[test]
    fn test_monthly_buckets_after_span() {
        let transactions = vec![
            tx("2024-01-10", "A", -10.0, "X"),
            tx("2024-02-10", "B", -10.0, "X"),
            tx("2024-03-10", "C", -10.0, "X"),
            tx("2024-04-20", "D", -10.0, "X"),
        ];
        let result = score(&transactions);
        assert_eq!(result.score, 100.0);
        assert!(result
            .evidence
            .contains(&Evidence::note("Transactions bucketed by month")));
    }

    #[test]
    fn test_cv_capped_at_zero_score() {
        // Eight empty weeks and one busy one push the CV above 1
        let mut transactions = vec![tx("2024-01-01", "A", -10.0, "X")];
        for _ in 0..20 {
            transactions.push(tx("2024-03-04", "B", -10.0, "X"));
        }
        assert_eq!(score(&transactions).score, 0.0);
    }

    #[test]
    fn test_week_start_is_monday() {
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(week_start(sunday), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
