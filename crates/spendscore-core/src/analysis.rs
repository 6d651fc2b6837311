//! Analysis pipeline
//!
//! detect -> normalize -> minimum-size check -> metric engine -> aggregator.
//! The analyzer holds a validated configuration and the injected lookup
//! tables; each call is an independent, deterministic computation.

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::ai::AIBackend;
use crate::config::ScoringConfig;
use crate::error::{Error, Result};
use crate::formats::{Detection, FormatDetector};
use crate::import::{Normalizer, RawTable, Rejection};
use crate::metrics::{MetricContext, MetricEngine};
use crate::models::{ColumnMapping, Recommendation, SpendScoreReport, Transaction};
use crate::providers::{BenchmarkProvider, ClassificationProvider, ClassificationTable};
use crate::recommend::{fallback_recommendations, RecommendationAdapter};
use crate::score::Aggregator;

/// Outcome of analyzing a raw table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub report: SpendScoreReport,
    pub detection: Detection,
    pub rejected_rows: usize,
    pub rejections: Vec<Rejection>,
    /// Cache key for this transaction set and configuration
    pub fingerprint: String,
}

/// Runs the scoring pipeline
pub struct Analyzer {
    config: ScoringConfig,
    engine: MetricEngine,
    benchmarks: Option<Box<dyn BenchmarkProvider>>,
    classification: Box<dyn ClassificationProvider>,
}

impl Analyzer {
    /// Create an analyzer, taking lookup tables from the configuration
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;

        let table = config.benchmark_table();
        let benchmarks: Option<Box<dyn BenchmarkProvider>> = if table.is_empty() {
            None
        } else {
            Some(Box::new(table))
        };
        let classification = Box::new(ClassificationTable::from_config(&config.classification));

        Ok(Self {
            config,
            engine: MetricEngine::new(),
            benchmarks,
            classification,
        })
    }

    pub fn with_benchmarks(mut self, benchmarks: Box<dyn BenchmarkProvider>) -> Self {
        self.benchmarks = Some(benchmarks);
        self
    }

    pub fn with_classification(mut self, classification: Box<dyn ClassificationProvider>) -> Self {
        self.classification = classification;
        self
    }

    pub fn with_engine(mut self, engine: MetricEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Analyze a raw table, detecting its layout unless a mapping is given
    pub fn analyze(&self, table: &RawTable, mapping: Option<&ColumnMapping>) -> Result<Analysis> {
        let detector = FormatDetector::new();
        let detection = match mapping {
            Some(mapping) => detector.explicit(&table.headers, mapping)?,
            None => detector.detect(&table.headers)?,
        };
        info!(
            layout = detection.layout.as_str(),
            method = detection.method.as_str(),
            confidence = detection.confidence,
            "Resolved column mapping"
        );

        let rows = Normalizer::new(&self.config.import).normalize(table, &detection.mapping)?;
        self.check_size(rows.transactions.len(), rows.rejected())?;

        let report = self.score(&rows.transactions)?;
        let fingerprint = fingerprint(&rows.transactions, &self.config)?;

        info!(
            score = report.overall_score,
            tier = report.tier.as_str(),
            transactions = rows.transactions.len(),
            rejected = rows.rejected(),
            "Analysis complete"
        );

        Ok(Analysis {
            report,
            detection,
            rejected_rows: rows.rejected(),
            rejections: rows.rejections,
            fingerprint,
        })
    }

    /// Score an already-canonical transaction set
    pub fn analyze_transactions(&self, transactions: &[Transaction]) -> Result<SpendScoreReport> {
        self.check_size(transactions.len(), 0)?;
        self.score(transactions)
    }

    /// Three recommendations for a report; never fails
    pub async fn recommend(
        &self,
        report: &SpendScoreReport,
        backend: Option<&dyn AIBackend>,
    ) -> Vec<Recommendation> {
        match RecommendationAdapter::new(self.config.recommendation_timeout()) {
            Ok(adapter) => adapter.recommend(report, backend).await,
            Err(e) => {
                tracing::warn!(error = %e, "Recommendation prompt unavailable, using fallback");
                fallback_recommendations(report)
            }
        }
    }

    fn check_size(&self, valid: usize, rejected: usize) -> Result<()> {
        if valid < self.config.min_transactions {
            return Err(Error::InsufficientData {
                valid,
                rejected,
                required: self.config.min_transactions,
            });
        }
        Ok(())
    }

    fn score(&self, transactions: &[Transaction]) -> Result<SpendScoreReport> {
        let ctx = MetricContext::new(
            transactions,
            &self.config.thresholds,
            self.benchmarks.as_deref(),
            self.classification.as_ref(),
        );
        let breakdown = self.engine.evaluate(&ctx, &self.config.weights);
        Aggregator::new(&self.config).aggregate(breakdown, transactions)
    }
}

/// Hex SHA-256 over the canonical transactions and the serialized config
pub fn fingerprint(transactions: &[Transaction], config: &ScoringConfig) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(transactions)?);
    hasher.update(config.to_toml_string()?.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricWeights;
    use crate::formats::{DetectionMethod, Layout};
    use crate::metrics::test_support::tx;
    use crate::models::{Field, MetricKind};
    use crate::providers::Industry;

    const CSV: &str = "\
Date,Description,Amount,Category
2024-01-02,Landlord Rent,-1200.00,Rent
2024-01-05,Fresh Market,-85.20,Groceries
2024-01-12,Fresh Market,-92.10,Groceries
2024-01-19,Corner Cafe,-12.50,Dining
2024-01-26,Fresh Market,-78.40,Groceries
not a date,Broken Row,-10.00,Dining
";

    #[test]
    fn test_analyze_csv() {
        let table = RawTable::from_csv_str(CSV).unwrap();
        let analysis = Analyzer::new(ScoringConfig::default())
            .unwrap()
            .analyze(&table, None)
            .unwrap();

        assert_eq!(analysis.report.summary_stats.transaction_count, 5);
        assert_eq!(analysis.rejected_rows, 1);
        assert_eq!(analysis.rejections[0].row, 6);
        assert_eq!(analysis.report.breakdown.len(), 6);
        assert!(analysis.report.overall_score <= 100);
        assert_eq!(analysis.fingerprint.len(), 64);
    }

    #[test]
    fn test_analyze_with_explicit_mapping() {
        let table = RawTable::from_csv_str(CSV).unwrap();
        let mapping = ColumnMapping::new()
            .with(Field::Date, "Date")
            .with(Field::Amount, "Amount")
            .with(Field::Description, "Description");

        let analysis = Analyzer::new(ScoringConfig::default())
            .unwrap()
            .analyze(&table, Some(&mapping))
            .unwrap();

        assert_eq!(analysis.detection.layout, Layout::Custom);
        assert_eq!(analysis.detection.method, DetectionMethod::Explicit);
        // Category not mapped, so everything is uncategorized
        assert_eq!(analysis.report.summary_stats.category_count, 1);
        assert_eq!(
            analysis.report.metric(MetricKind::CategoryDiversity).unwrap().score,
            0.0
        );
    }

    #[test]
    fn test_explicit_mapping_missing_optional_column_defaults() {
        let table = RawTable::from_csv_str(CSV).unwrap();
        let mapping = ColumnMapping::new()
            .with(Field::Date, "Date")
            .with(Field::Amount, "Amount")
            .with(Field::Description, "Description")
            .with(Field::Category, "Cat");

        let analysis = Analyzer::new(ScoringConfig::default())
            .unwrap()
            .analyze(&table, Some(&mapping))
            .unwrap();

        assert!(analysis.detection.mapping.get(Field::Category).is_none());
        assert_eq!(analysis.report.summary_stats.category_count, 1);
        assert_eq!(analysis.report.summary_stats.transaction_count, 5);
    }

    #[test]
    fn test_insufficient_data() {
        let table = RawTable::from_csv_str(
            "Date,Description,Amount\n2024-01-01,A,-1\n2024-01-02,B,oops\n2024-01-03,C,-3\n",
        )
        .unwrap();

        let err = Analyzer::new(ScoringConfig::default())
            .unwrap()
            .analyze(&table, None)
            .unwrap_err();
        match err {
            Error::InsufficientData {
                valid,
                rejected,
                required,
            } => {
                assert_eq!((valid, rejected, required), (2, 1, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ScoringConfig::default();
        config.weights = MetricWeights {
            frequency: 50,
            ..MetricWeights::default()
        };
        assert!(matches!(
            Analyzer::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_min_transactions_cannot_drop_below_floor() {
        let mut config = ScoringConfig::default();
        config.min_transactions = 1;
        assert!(matches!(
            Analyzer::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_fingerprint_tracks_inputs() {
        let transactions = vec![
            tx("2024-01-01", "A", -1.0, "X"),
            tx("2024-01-02", "B", -2.0, "Y"),
        ];
        let config = ScoringConfig::default();
        let first = fingerprint(&transactions, &config).unwrap();
        assert_eq!(first, fingerprint(&transactions, &config).unwrap());

        let mut changed = transactions.clone();
        changed[1].amount = -2.5;
        assert_ne!(first, fingerprint(&changed, &config).unwrap());

        let mut other_config = config.clone();
        other_config.thresholds.duplicate_window_days = 5;
        assert_ne!(first, fingerprint(&transactions, &other_config).unwrap());
    }

    #[test]
    fn test_benchmarks_from_config() {
        let mut config = ScoringConfig::default();
        config.benchmarks.insert("Rent".into(), 0.8);
        config.benchmarks.insert("Groceries".into(), 0.2);
        let transactions = vec![
            tx("2024-01-01", "Landlord", -800.0, "Rent"),
            tx("2024-01-02", "Market", -100.0, "Groceries"),
            tx("2024-01-03", "Market", -100.0, "Groceries"),
        ];

        let report = Analyzer::new(config)
            .unwrap()
            .analyze_transactions(&transactions)
            .unwrap();
        let budget = report.metric(MetricKind::BudgetAdherence).unwrap();
        assert!((budget.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_industry_preset_with_overrides() {
        let transactions = vec![
            tx("2024-01-01", "Landlord", -860.0, "Rent"),
            tx("2024-01-02", "City Power", -80.0, "Utilities"),
            tx("2024-01-03", "Cover Co", -60.0, "Insurance"),
        ];
        let budget_score = |config: ScoringConfig| {
            Analyzer::new(config)
                .unwrap()
                .analyze_transactions(&transactions)
                .unwrap()
                .metric(MetricKind::BudgetAdherence)
                .unwrap()
                .score
        };

        let mut config = ScoringConfig::default();
        let uniform = budget_score(config.clone());

        config.industry = Some(Industry::General);
        let preset = budget_score(config.clone());
        assert!((preset - 100.0).abs() < 1e-9);
        assert!(preset > uniform);

        // Utilities 8% vs 16% -> 50% deviation, Insurance on target
        config.benchmarks.insert("Utilities".into(), 0.16);
        assert!((budget_score(config) - 75.0).abs() < 1e-9);
    }
}
