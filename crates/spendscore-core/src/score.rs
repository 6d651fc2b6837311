//! Aggregator - weighted overall score, tier and summary statistics

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ScoringConfig;
use crate::error::{Error, Result};
use crate::import::vendor_key;
use crate::metrics::frequency::month_index;
use crate::metrics::stats::{linear_slope, mean, median, round2};
use crate::models::{
    MetricResult, MonthlySpend, SpendScoreReport, SpendTrend, SummaryStats, Tier, Transaction,
    TrendDirection,
};

/// Slopes smaller than half a cent per month count as flat
const FLAT_TREND_EPSILON: f64 = 0.005;

/// Combines metric results into a report
pub struct Aggregator<'a> {
    config: &'a ScoringConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    /// Build the report for a breakdown computed over `transactions`
    pub fn aggregate(
        &self,
        breakdown: Vec<MetricResult>,
        transactions: &[Transaction],
    ) -> Result<SpendScoreReport> {
        let summary_stats = summarize(transactions)?;
        let overall_score = overall_score(&breakdown);
        let tier = self.config.tiers.tier_for(overall_score);

        tracing::debug!(
            score = overall_score,
            tier = tier.as_str(),
            transactions = transactions.len(),
            "Aggregated SpendScore"
        );

        Ok(SpendScoreReport {
            overall_score,
            tier,
            breakdown,
            reward_eligible: tier == Tier::Green,
            summary_stats,
        })
    }
}

/// `round(Σ score × weight / 100)`, clamped to 0-100
pub fn overall_score(breakdown: &[MetricResult]) -> u32 {
    let weighted: f64 = breakdown.iter().map(MetricResult::contribution).sum();
    if !weighted.is_finite() {
        return 0;
    }
    weighted.round().clamp(0.0, 100.0) as u32
}

/// Summary statistics over a non-empty transaction set
pub fn summarize(transactions: &[Transaction]) -> Result<SummaryStats> {
    let first_date = transactions.iter().map(|t| t.date).min();
    let last_date = transactions.iter().map(|t| t.date).max();
    let (first_date, last_date) = match (first_date, last_date) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(Error::InvalidData(
                "Cannot summarize an empty transaction set".into(),
            ))
        }
    };

    let amounts: Vec<f64> = transactions.iter().map(|t| t.amount).collect();
    let category_count = transactions
        .iter()
        .map(|t| t.category_key())
        .collect::<BTreeSet<_>>()
        .len();
    let vendor_count = transactions
        .iter()
        .map(|t| vendor_key(&t.vendor))
        .collect::<BTreeSet<_>>()
        .len();
    let span_days = (last_date - first_date).num_days();

    Ok(SummaryStats {
        total_amount: amounts.iter().sum(),
        transaction_count: transactions.len(),
        category_count,
        vendor_count,
        mean_amount: mean(&amounts),
        median_amount: median(&amounts),
        first_date,
        last_date,
        confidence: confidence(transactions.len(), span_days, category_count),
        spend_trend: spend_trend(transactions),
    })
}

/// Least-squares trend over monthly spend with a next-month forecast
///
/// Months between the first and last transaction with no spend count as
/// zero. Returns `None` when everything falls in one month.
pub fn spend_trend(transactions: &[Transaction]) -> Option<SpendTrend> {
    let first = transactions.iter().map(|t| month_index(t.date)).min()?;
    let last = transactions.iter().map(|t| month_index(t.date)).max()?;
    if first == last {
        return None;
    }

    let mut totals: BTreeMap<i64, f64> = (first..=last).map(|m| (m, 0.0)).collect();
    for tx in transactions {
        *totals.entry(month_index(tx.date)).or_insert(0.0) += tx.spend();
    }

    let values: Vec<f64> = totals.values().copied().collect();
    let slope = linear_slope(&values);
    let latest = values.last().copied()?;
    let direction = if slope.abs() < FLAT_TREND_EPSILON {
        TrendDirection::Flat
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    Some(SpendTrend {
        months: totals
            .iter()
            .map(|(m, spend)| MonthlySpend {
                month: format!("{:04}-{:02}", m.div_euclid(12), m.rem_euclid(12) + 1),
                spend: round2(*spend),
            })
            .collect(),
        direction,
        monthly_change: round2(slope),
        next_month_forecast: round2((latest + slope).max(0.0)),
        significant_increase: direction == TrendDirection::Increasing
            && slope > mean(&values) * 0.1,
    })
}

/// Mean of volume, date-span and category-spread factors
pub fn confidence(transaction_count: usize, span_days: i64, category_count: usize) -> f64 {
    let volume = match transaction_count {
        n if n >= 100 => 1.0,
        n if n >= 50 => 0.8,
        n if n >= 20 => 0.6,
        _ => 0.4,
    };
    let span = match span_days {
        d if d >= 90 => 1.0,
        d if d >= 30 => 0.8,
        _ => 0.6,
    };
    let spread = match category_count {
        c if c >= 10 => 1.0,
        c if c >= 5 => 0.8,
        _ => 0.6,
    };
    (volume + span + spread) / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::tx;
    use crate::models::MetricKind;

    fn breakdown(scores: [f64; 6]) -> Vec<MetricResult> {
        let weights = crate::config::MetricWeights::default();
        MetricKind::all()
            .iter()
            .zip(scores)
            .map(|(kind, score)| MetricResult {
                kind: *kind,
                name: kind.name().to_string(),
                score,
                weight: weights.get(*kind),
                evidence: vec![],
                degraded: false,
            })
            .collect()
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx("2024-01-01", "Rent", -1000.0, "Rent"),
            tx("2024-01-15", "Market", -120.0, "Groceries"),
            tx("2024-02-01", "Refund", 20.0, "groceries"),
        ]
    }

    #[test]
    fn test_overall_score_weighted_and_rounded() {
        // 15*80 + 10*60 + 20*90 + 15*100 + 20*70 + 20*50 = 7500 -> 75
        let results = breakdown([80.0, 60.0, 90.0, 100.0, 70.0, 50.0]);
        assert_eq!(overall_score(&results), 75);

        let results = breakdown([90.6; 6]);
        assert_eq!(overall_score(&results), 91);
    }

    #[test]
    fn test_overall_score_bounds() {
        assert_eq!(overall_score(&breakdown([0.0; 6])), 0);
        assert_eq!(overall_score(&breakdown([100.0; 6])), 100);
    }

    #[test]
    fn test_tiers_and_reward() {
        let config = ScoringConfig::default();
        let aggregator = Aggregator::new(&config);
        let transactions = sample();

        let green = aggregator
            .aggregate(breakdown([95.0; 6]), &transactions)
            .unwrap();
        assert_eq!(green.overall_score, 95);
        assert_eq!(green.tier, Tier::Green);
        assert!(green.reward_eligible);

        let amber = aggregator
            .aggregate(breakdown([75.0; 6]), &transactions)
            .unwrap();
        assert_eq!(amber.tier, Tier::Amber);
        assert!(!amber.reward_eligible);

        let red = aggregator
            .aggregate(breakdown([50.0; 6]), &transactions)
            .unwrap();
        assert_eq!(red.tier, Tier::Red);
        assert_eq!(red.tier.label(), "Needs Improvement");
    }

    #[test]
    fn test_summary_stats() {
        let stats = summarize(&sample()).unwrap();
        assert_eq!(stats.total_amount, -1100.0);
        assert_eq!(stats.transaction_count, 3);
        assert_eq!(stats.category_count, 2);
        assert_eq!(stats.vendor_count, 3);
        assert_eq!(stats.median_amount, -120.0);
        assert_eq!(stats.first_date.to_string(), "2024-01-01");
        assert_eq!(stats.last_date.to_string(), "2024-02-01");
        // volume 0.4, span 31 days 0.8, two categories 0.6
        assert!((stats.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_spend_trend_increasing() {
        let transactions = vec![
            tx("2024-01-10", "Supplies", -100.0, "Office"),
            tx("2024-02-10", "Supplies", -150.0, "Office"),
            tx("2024-02-20", "Refund", 50.0, "Office"),
            tx("2024-03-10", "Supplies", -300.0, "Office"),
        ];
        let trend = spend_trend(&transactions).unwrap();

        let months: Vec<&str> = trend.months.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(trend.months[1].spend, 200.0);
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_eq!(trend.monthly_change, 100.0);
        assert_eq!(trend.next_month_forecast, 400.0);
        assert!(trend.significant_increase);
    }

    #[test]
    fn test_spend_trend_fills_gaps_and_floors_forecast() {
        let transactions = vec![
            tx("2023-11-05", "Rent", -900.0, "Rent"),
            tx("2024-01-05", "Rent", -100.0, "Rent"),
        ];
        let trend = spend_trend(&transactions).unwrap();

        let months: Vec<&str> = trend.months.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01"]);
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert_eq!(trend.monthly_change, -400.0);
        assert_eq!(trend.next_month_forecast, 0.0);
        assert!(!trend.significant_increase);
    }

    #[test]
    fn test_spend_trend_needs_two_months() {
        let transactions = vec![
            tx("2024-01-01", "A", -10.0, "X"),
            tx("2024-01-31", "B", -20.0, "X"),
        ];
        assert!(spend_trend(&transactions).is_none());

        let flat = vec![
            tx("2024-01-01", "A", -10.0, "X"),
            tx("2024-02-01", "B", -10.0, "X"),
        ];
        assert_eq!(spend_trend(&flat).unwrap().direction, TrendDirection::Flat);
    }

    #[test]
    fn test_summarize_empty_fails() {
        assert!(summarize(&[]).is_err());
    }

    #[test]
    fn test_confidence_factors() {
        assert_eq!(confidence(100, 90, 10), 1.0);
        assert!((confidence(50, 30, 5) - 0.8).abs() < 1e-9);
        assert!((confidence(3, 0, 1) - (0.4 + 0.6 + 0.6) / 3.0).abs() < 1e-9);
    }
}
