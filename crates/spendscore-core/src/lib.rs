//! SpendScore Core Library
//!
//! Expense-health scoring for accounting exports:
//! - Format detection for QuickBooks, Xero, Wave, Revolut and generic layouts
//! - Normalization of raw rows into canonical transactions
//! - Six weighted sub-metrics with evidence
//! - Overall score, tier and summary statistics
//! - Recommendations from a pluggable text-generation backend, with a
//!   deterministic fallback
//! - Layered configuration and prompt library

pub mod ai;
pub mod analysis;
pub mod config;
pub mod error;
pub mod formats;
pub mod import;
pub mod metrics;
pub mod models;
pub mod prompts;
pub mod providers;
pub mod recommend;
pub mod score;

pub use ai::{backend_from_env, AIBackend, MockBackend, RecommendationRequest};
pub use analysis::{fingerprint, Analysis, Analyzer};
pub use config::{
    ClassificationConfig, ImportConfig, MetricThresholds, MetricWeights, ScoringConfig,
    TierThresholds,
};
pub use error::{Error, Result};
pub use formats::{Detection, DetectionMethod, FormatDetector, Layout};
pub use import::{NormalizedRows, Normalizer, RawTable, Rejection};
pub use metrics::{Metric, MetricContext, MetricEngine, MetricScore};
pub use models::{
    ColumnMapping, ColumnRef, Evidence, Field, FlaggedTransaction, MetricKind, MetricResult,
    MonthlySpend, Priority, Recommendation, RecommendationSource, SpendScoreReport, SpendTrend,
    SummaryStats, Tier, Transaction, TrendDirection,
};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use providers::{
    BenchmarkProvider, BenchmarkRange, BenchmarkStatus, BenchmarkTable, ClassificationProvider,
    ClassificationTable, Industry,
};
pub use recommend::{fallback_recommendations, RecommendationAdapter};
pub use score::Aggregator;
