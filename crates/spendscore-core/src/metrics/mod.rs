//! Metric Engine - the six SpendScore calculators
//!
//! Each calculator scores one aspect of spending on a 0-100 scale (100 is
//! ideal) and returns the evidence behind the score. Calculators are pure
//! functions of the transaction set and the injected tables.
//!
//! ## Metrics
//!
//! - **Frequency** - regularity of transaction counts over time
//! - **Category Diversity** - entropy of spend across categories
//! - **Budget Adherence** - actual vs benchmark category shares
//! - **Redundancy** - duplicate charges and overlapping vendors
//! - **Spike Detection** - outlier amounts within a category
//! - **Waste Ratio** - share of discretionary spend
//!
//! A failing calculator never fails the analysis: the engine logs a warning
//! and substitutes the configured default score, marked as degraded.

pub mod budget;
pub mod diversity;
pub mod frequency;
pub mod redundancy;
pub mod spikes;
pub mod stats;
pub mod waste;

pub use budget::BudgetAdherenceMetric;
pub use diversity::CategoryDiversityMetric;
pub use frequency::FrequencyMetric;
pub use redundancy::RedundancyMetric;
pub use spikes::SpikeDetectionMetric;
pub use waste::WasteRatioMetric;

use std::collections::BTreeMap;
use std::thread;

use crate::config::{MetricThresholds, MetricWeights};
use crate::error::{Error, Result};
use crate::models::{Evidence, MetricKind, MetricResult, Transaction};
use crate::providers::{BenchmarkProvider, ClassificationProvider};

/// Inputs shared by every calculator
pub struct MetricContext<'a> {
    pub transactions: &'a [Transaction],
    pub thresholds: &'a MetricThresholds,
    /// Expected category shares; `None` means no table was supplied
    pub benchmarks: Option<&'a dyn BenchmarkProvider>,
    pub classification: &'a dyn ClassificationProvider,
}

impl<'a> MetricContext<'a> {
    pub fn new(
        transactions: &'a [Transaction],
        thresholds: &'a MetricThresholds,
        benchmarks: Option<&'a dyn BenchmarkProvider>,
        classification: &'a dyn ClassificationProvider,
    ) -> Self {
        Self {
            transactions,
            thresholds,
            benchmarks,
            classification,
        }
    }

    /// Sum of spend magnitudes
    pub fn total_spend(&self) -> f64 {
        self.transactions.iter().map(|t| t.spend()).sum()
    }
}

/// Raw output of a calculator before weighting
#[derive(Debug, Clone, PartialEq)]
pub struct MetricScore {
    pub score: f64,
    pub evidence: Vec<Evidence>,
}

impl MetricScore {
    pub fn new(score: f64, evidence: Vec<Evidence>) -> Self {
        Self { score, evidence }
    }
}

/// A single sub-metric calculator
pub trait Metric: Send + Sync {
    fn kind(&self) -> MetricKind;

    /// Compute the score. Errors are recovered by the engine.
    fn compute(&self, ctx: &MetricContext<'_>) -> Result<MetricScore>;
}

/// Runs the registered calculators and assembles the breakdown
pub struct MetricEngine {
    metrics: Vec<Box<dyn Metric>>,
}

impl Default for MetricEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricEngine {
    /// Create an engine with the six built-in calculators
    pub fn new() -> Self {
        let mut engine = Self { metrics: vec![] };

        engine.register(Box::new(FrequencyMetric));
        engine.register(Box::new(CategoryDiversityMetric));
        engine.register(Box::new(BudgetAdherenceMetric));
        engine.register(Box::new(RedundancyMetric));
        engine.register(Box::new(SpikeDetectionMetric));
        engine.register(Box::new(WasteRatioMetric));

        engine
    }

    /// Register a calculator, replacing any existing one of the same kind
    pub fn register(&mut self, metric: Box<dyn Metric>) {
        let kind = metric.kind();
        self.metrics.retain(|m| m.kind() != kind);
        self.metrics.push(metric);
    }

    pub fn kinds(&self) -> Vec<MetricKind> {
        self.metrics.iter().map(|m| m.kind()).collect()
    }

    /// Run every calculator on its own scoped thread
    ///
    /// Results come back in breakdown order regardless of completion order.
    pub fn evaluate(&self, ctx: &MetricContext<'_>, weights: &MetricWeights) -> Vec<MetricResult> {
        let outcomes: Vec<(MetricKind, Result<MetricScore>)> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .metrics
                .iter()
                .map(|metric| {
                    let kind = metric.kind();
                    (kind, scope.spawn(move || metric.compute(ctx)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(kind, handle)| {
                    let outcome = handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::Metric("calculator panicked".into())));
                    (kind, outcome)
                })
                .collect()
        });

        let mut results: Vec<MetricResult> = outcomes
            .into_iter()
            .map(|(kind, outcome)| self.finish(kind, outcome, ctx.thresholds, weights))
            .collect();
        results.sort_by_key(|r| r.kind);
        results
    }

    fn finish(
        &self,
        kind: MetricKind,
        outcome: Result<MetricScore>,
        thresholds: &MetricThresholds,
        weights: &MetricWeights,
    ) -> MetricResult {
        let checked = outcome.and_then(|s| {
            if s.score.is_finite() {
                Ok(s)
            } else {
                Err(Error::Metric(format!("non-finite score {}", s.score)))
            }
        });

        match checked {
            Ok(s) => {
                tracing::debug!(metric = kind.as_str(), score = s.score, "Metric computed");
                MetricResult {
                    kind,
                    name: kind.name().to_string(),
                    score: s.score.clamp(0.0, 100.0),
                    weight: weights.get(kind),
                    evidence: s.evidence,
                    degraded: false,
                }
            }
            Err(e) => {
                tracing::warn!(
                    metric = kind.as_str(),
                    error = %e,
                    "Metric computation failed, using default score"
                );
                MetricResult {
                    kind,
                    name: kind.name().to_string(),
                    score: thresholds.default_metric_score,
                    weight: weights.get(kind),
                    evidence: vec![Evidence::note(format!(
                        "Could not be computed ({}); default score applied",
                        e
                    ))],
                    degraded: true,
                }
            }
        }
    }
}

/// Transaction indices keyed by normalized category
pub(crate) fn indices_by_category(transactions: &[Transaction]) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, tx) in transactions.iter().enumerate() {
        groups.entry(tx.category_key()).or_default().push(i);
    }
    groups
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;

    use crate::models::Transaction;

    pub fn tx(date: &str, description: &str, amount: f64, category: &str) -> Transaction {
        Transaction {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: description.to_string(),
            amount,
            category: category.to_string(),
            vendor: description.to_uppercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::tx;
    use super::*;
    use crate::providers::ClassificationTable;

    struct FailingMetric;

    impl Metric for FailingMetric {
        fn kind(&self) -> MetricKind {
            MetricKind::SpikeDetection
        }

        fn compute(&self, _ctx: &MetricContext<'_>) -> Result<MetricScore> {
            Err(Error::Metric("boom".into()))
        }
    }

    struct NanMetric;

    impl Metric for NanMetric {
        fn kind(&self) -> MetricKind {
            MetricKind::WasteRatio
        }

        fn compute(&self, _ctx: &MetricContext<'_>) -> Result<MetricScore> {
            Ok(MetricScore::new(f64::NAN, vec![]))
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx("2024-01-01", "Rent", -1000.0, "Rent"),
            tx("2024-01-08", "Groceries", -120.0, "Groceries"),
            tx("2024-01-15", "Cinema", -30.0, "Entertainment"),
        ]
    }

    #[test]
    fn test_engine_creation() {
        let engine = MetricEngine::new();
        assert_eq!(engine.kinds(), MetricKind::all().to_vec());
    }

    #[test]
    fn test_evaluate_fixed_order_and_weights() {
        let transactions = sample();
        let thresholds = MetricThresholds::default();
        let classification = ClassificationTable::standard();
        let ctx = MetricContext::new(&transactions, &thresholds, None, &classification);

        let results = MetricEngine::new().evaluate(&ctx, &MetricWeights::default());
        let kinds: Vec<MetricKind> = results.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, MetricKind::all().to_vec());
        assert_eq!(results.iter().map(|r| r.weight).sum::<u32>(), 100);
        assert!(results.iter().all(|r| !r.degraded));
        assert!(results.iter().all(|r| (0.0..=100.0).contains(&r.score)));
    }

    #[test]
    fn test_failing_metric_degrades() {
        let transactions = sample();
        let thresholds = MetricThresholds::default();
        let classification = ClassificationTable::standard();
        let ctx = MetricContext::new(&transactions, &thresholds, None, &classification);

        let mut engine = MetricEngine::new();
        engine.register(Box::new(FailingMetric));
        engine.register(Box::new(NanMetric));
        let results = engine.evaluate(&ctx, &MetricWeights::default());

        assert_eq!(results.len(), 6);
        let spike = &results[4];
        assert_eq!(spike.kind, MetricKind::SpikeDetection);
        assert!(spike.degraded);
        assert_eq!(spike.score, 50.0);
        assert!(matches!(&spike.evidence[0], Evidence::Note { text } if text.contains("boom")));

        let waste = &results[5];
        assert!(waste.degraded);
        assert_eq!(waste.score, 50.0);
    }
}
