//! Scoring configuration
//!
//! Weights, tier thresholds and metric thresholds live in a validated
//! [`ScoringConfig`] that is passed to the analyzer at construction.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/spendscore/config/scoring.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their defaults. The merged result is
//! validated before it is returned, so a bad weight table fails at load time.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{MetricKind, Tier};
use crate::providers::{BenchmarkTable, Industry};

/// Embedded default config (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/scoring.toml");

/// Floor for `min_transactions`; fewer valid rows can never be scored
pub const MIN_TRANSACTIONS: usize = 3;

/// Percentage weight of each metric in the overall score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricWeights {
    pub frequency: u32,
    pub category_diversity: u32,
    pub budget_adherence: u32,
    pub redundancy: u32,
    pub spike_detection: u32,
    pub waste_ratio: u32,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            frequency: 15,
            category_diversity: 10,
            budget_adherence: 20,
            redundancy: 15,
            spike_detection: 20,
            waste_ratio: 20,
        }
    }
}

impl MetricWeights {
    pub fn get(&self, kind: MetricKind) -> u32 {
        match kind {
            MetricKind::Frequency => self.frequency,
            MetricKind::CategoryDiversity => self.category_diversity,
            MetricKind::BudgetAdherence => self.budget_adherence,
            MetricKind::Redundancy => self.redundancy,
            MetricKind::SpikeDetection => self.spike_detection,
            MetricKind::WasteRatio => self.waste_ratio,
        }
    }

    fn set(&mut self, kind: MetricKind, weight: u32) {
        let slot = match kind {
            MetricKind::Frequency => &mut self.frequency,
            MetricKind::CategoryDiversity => &mut self.category_diversity,
            MetricKind::BudgetAdherence => &mut self.budget_adherence,
            MetricKind::Redundancy => &mut self.redundancy,
            MetricKind::SpikeDetection => &mut self.spike_detection,
            MetricKind::WasteRatio => &mut self.waste_ratio,
        };
        *slot = weight;
    }

    pub fn total(&self) -> u32 {
        MetricKind::all().iter().map(|k| self.get(*k)).sum()
    }

    pub fn validate(&self) -> Result<()> {
        let total = self.total();
        if total != 100 {
            return Err(Error::InvalidConfig(format!(
                "metric weights must sum to 100, got {}",
                total
            )));
        }
        Ok(())
    }
}

/// Overall score thresholds for the green and amber tiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    /// Scores at or above this are green
    pub green: u32,
    /// Scores at or above this (and below green) are amber
    pub amber: u32,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            green: 90,
            amber: 70,
        }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, score: u32) -> Tier {
        if score >= self.green {
            Tier::Green
        } else if score >= self.amber {
            Tier::Amber
        } else {
            Tier::Red
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.green > 100 {
            return Err(Error::InvalidConfig(format!(
                "green tier threshold must be at most 100, got {}",
                self.green
            )));
        }
        if self.green <= self.amber {
            return Err(Error::InvalidConfig(format!(
                "green tier threshold ({}) must be greater than amber ({})",
                self.green, self.amber
            )));
        }
        Ok(())
    }
}

/// Per-metric tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricThresholds {
    /// Date span (days) above which frequency buckets are months instead of weeks
    pub monthly_bucket_after_days: i64,
    /// Inclusive window (days) for duplicate detection
    pub duplicate_window_days: i64,
    /// Spike threshold = mean + multiplier * stddev
    pub spike_stddev_multiplier: f64,
    /// Categories smaller than this use the single-largest rule
    pub small_category_size: usize,
    /// Categories smaller than this are skipped by spike detection
    pub min_category_size: usize,
    /// Substituted score for a metric that fails to compute
    pub default_metric_score: f64,
}

impl Default for MetricThresholds {
    fn default() -> Self {
        Self {
            monthly_bucket_after_days: 90,
            duplicate_window_days: 3,
            spike_stddev_multiplier: 2.0,
            small_category_size: 4,
            min_category_size: 2,
            default_metric_score: 50.0,
        }
    }
}

impl MetricThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.monthly_bucket_after_days < 0 {
            return Err(Error::InvalidConfig(
                "monthly_bucket_after_days must not be negative".into(),
            ));
        }
        if self.duplicate_window_days < 0 {
            return Err(Error::InvalidConfig(
                "duplicate_window_days must not be negative".into(),
            ));
        }
        if !self.spike_stddev_multiplier.is_finite() || self.spike_stddev_multiplier <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "spike_stddev_multiplier must be a positive number, got {}",
                self.spike_stddev_multiplier
            )));
        }
        if self.min_category_size < 2 {
            return Err(Error::InvalidConfig(
                "min_category_size must be at least 2".into(),
            ));
        }
        if self.small_category_size < self.min_category_size {
            return Err(Error::InvalidConfig(format!(
                "small_category_size ({}) must not be below min_category_size ({})",
                self.small_category_size, self.min_category_size
            )));
        }
        if !(0.0..=100.0).contains(&self.default_metric_score) {
            return Err(Error::InvalidConfig(format!(
                "default_metric_score must be within 0-100, got {}",
                self.default_metric_score
            )));
        }
        Ok(())
    }
}

/// Normalizer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Date formats tried in order
    pub date_formats: Vec<String>,
    /// Date-time formats tried after the date formats
    pub datetime_formats: Vec<String>,
    /// Significant words kept for a derived vendor
    pub vendor_words: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            date_formats: [
                "%Y-%m-%d",
                "%m/%d/%Y",
                "%d/%m/%Y",
                "%m/%d/%y",
                "%m-%d-%Y",
                "%Y/%m/%d",
                "%d-%b-%Y",
                "%b %d, %Y",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            datetime_formats: ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vendor_words: 2,
        }
    }
}

/// Category lists for the waste ratio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub essential: Vec<String>,
    pub discretionary: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            essential: [
                "utilities",
                "rent",
                "mortgage",
                "insurance",
                "groceries",
                "fuel",
                "medical",
                "healthcare",
                "transportation",
                "education",
                "childcare",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            discretionary: [
                "entertainment",
                "gaming",
                "subscriptions",
                "luxury",
                "dining",
                "fast food",
                "coffee",
                "alcohol",
                "tobacco",
                "impulse purchases",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Complete, validated scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Minimum valid transactions required for scoring
    pub min_transactions: usize,
    pub weights: MetricWeights,
    pub tiers: TierThresholds,
    pub thresholds: MetricThresholds,
    pub import: ImportConfig,
    /// Seconds allowed for the recommendation backend
    pub recommendation_timeout_secs: u64,
    /// Industry preset the benchmarks start from
    pub industry: Option<Industry>,
    /// Expected share (0-1) per category, keyed as written; overrides the preset
    pub benchmarks: BTreeMap<String, f64>,
    pub classification: ClassificationConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_transactions: MIN_TRANSACTIONS,
            weights: MetricWeights::default(),
            tiers: TierThresholds::default(),
            thresholds: MetricThresholds::default(),
            import: ImportConfig::default(),
            recommendation_timeout_secs: 30,
            industry: None,
            benchmarks: BTreeMap::new(),
            classification: ClassificationConfig::default(),
        }
    }
}

impl ScoringConfig {
    /// Load from the data-dir override, or the embedded default
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit file (must exist)
    pub fn from_path(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// Parse TOML content merged over the defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        parse_config(content)
    }

    /// Replace the weights, validating the result
    pub fn with_weights(mut self, weights: MetricWeights) -> Result<Self> {
        weights.validate()?;
        self.weights = weights;
        Ok(self)
    }

    /// Replace the tier thresholds, validating the result
    pub fn with_tiers(mut self, tiers: TierThresholds) -> Result<Self> {
        tiers.validate()?;
        self.tiers = tiers;
        Ok(self)
    }

    /// Industry preset (if any) overlaid with the `[benchmarks]` entries
    pub fn benchmark_table(&self) -> BenchmarkTable {
        let mut table = self
            .industry
            .map(|industry| industry.benchmarks())
            .unwrap_or_default();
        table.merge(&BenchmarkTable::from_map(&self.benchmarks));
        table
    }

    pub fn recommendation_timeout(&self) -> Duration {
        Duration::from_secs(self.recommendation_timeout_secs)
    }

    /// Check every invariant the analyzer relies on
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.tiers.validate()?;
        self.thresholds.validate()?;

        if self.min_transactions < MIN_TRANSACTIONS {
            return Err(Error::InvalidConfig(format!(
                "min_transactions must be at least {}, got {}",
                MIN_TRANSACTIONS, self.min_transactions
            )));
        }
        if self.import.date_formats.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one date format is required".into(),
            ));
        }
        if self.import.vendor_words == 0 {
            return Err(Error::InvalidConfig(
                "vendor_words must be at least 1".into(),
            ));
        }
        if self.recommendation_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "recommendation timeout must be at least 1 second".into(),
            ));
        }
        if let Some((category, share)) = self.benchmarks.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "benchmark for '{}' is not a number: {}",
                category, share
            )));
        }
        Ok(())
    }

    /// Canonical TOML rendering (used by `config show` and fingerprints)
    pub fn to_toml_string(&self) -> Result<String> {
        let raw = RawConfig::from(self);
        toml::to_string_pretty(&raw)
            .map_err(|e| Error::InvalidConfig(format!("Failed to serialize config: {}", e)))
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("spendscore").join("config").join("scoring.toml"))
}

/// Load configuration (explicit path, then data-dir override, then default)
fn load_config(override_path: Option<&Path>) -> Result<ScoringConfig> {
    let content = if let Some(path) = override_path {
        fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("Failed to read config {}: {}", path.display(), e))
        })?
    } else if let Some(default_path) = default_config_path().filter(|p| p.exists()) {
        debug!(path = %default_path.display(), "Using scoring config override");
        fs::read_to_string(&default_path)
            .map_err(|e| Error::InvalidConfig(format!("Failed to read config: {}", e)))?
    } else {
        DEFAULT_CONFIG.to_string()
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawConfig {
    scoring: Option<RawScoring>,
    weights: Option<BTreeMap<String, u32>>,
    tiers: Option<RawTiers>,
    thresholds: Option<RawThresholds>,
    import: Option<RawImport>,
    recommendations: Option<RawRecommendations>,
    benchmarks: Option<BTreeMap<String, f64>>,
    classification: Option<RawClassification>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawScoring {
    min_transactions: Option<usize>,
    default_metric_score: Option<f64>,
    industry: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawTiers {
    green: Option<u32>,
    amber: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawThresholds {
    monthly_bucket_after_days: Option<i64>,
    duplicate_window_days: Option<i64>,
    spike_stddev_multiplier: Option<f64>,
    small_category_size: Option<usize>,
    min_category_size: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawImport {
    date_formats: Option<Vec<String>>,
    datetime_formats: Option<Vec<String>>,
    vendor_words: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawRecommendations {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawClassification {
    essential: Option<Vec<String>>,
    discretionary: Option<Vec<String>>,
}

impl From<&ScoringConfig> for RawConfig {
    fn from(config: &ScoringConfig) -> Self {
        let weights = MetricKind::all()
            .iter()
            .map(|k| (k.as_str().to_string(), config.weights.get(*k)))
            .collect();
        let t = &config.thresholds;

        RawConfig {
            scoring: Some(RawScoring {
                min_transactions: Some(config.min_transactions),
                default_metric_score: Some(t.default_metric_score),
                industry: config.industry.map(|i| i.as_str().to_string()),
            }),
            weights: Some(weights),
            tiers: Some(RawTiers {
                green: Some(config.tiers.green),
                amber: Some(config.tiers.amber),
            }),
            thresholds: Some(RawThresholds {
                monthly_bucket_after_days: Some(t.monthly_bucket_after_days),
                duplicate_window_days: Some(t.duplicate_window_days),
                spike_stddev_multiplier: Some(t.spike_stddev_multiplier),
                small_category_size: Some(t.small_category_size),
                min_category_size: Some(t.min_category_size),
            }),
            import: Some(RawImport {
                date_formats: Some(config.import.date_formats.clone()),
                datetime_formats: Some(config.import.datetime_formats.clone()),
                vendor_words: Some(config.import.vendor_words),
            }),
            recommendations: Some(RawRecommendations {
                timeout_secs: Some(config.recommendation_timeout_secs),
            }),
            benchmarks: Some(config.benchmarks.clone()),
            classification: Some(RawClassification {
                essential: Some(config.classification.essential.clone()),
                discretionary: Some(config.classification.discretionary.clone()),
            }),
        }
    }
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<ScoringConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::InvalidConfig(format!("Invalid config TOML: {}", e)))?;

    let mut config = ScoringConfig::default();

    if let Some(scoring) = raw.scoring {
        if let Some(min) = scoring.min_transactions {
            config.min_transactions = min;
        }
        if let Some(score) = scoring.default_metric_score {
            config.thresholds.default_metric_score = score;
        }
        if let Some(industry) = scoring.industry {
            config.industry = Some(industry.parse().map_err(Error::InvalidConfig)?);
        }
    }

    // A weights table replaces the defaults wholesale so partial tables fail validation
    if let Some(weights) = raw.weights {
        let mut merged = MetricWeights {
            frequency: 0,
            category_diversity: 0,
            budget_adherence: 0,
            redundancy: 0,
            spike_detection: 0,
            waste_ratio: 0,
        };
        for (name, weight) in weights {
            let kind: MetricKind = name.parse().map_err(Error::InvalidConfig)?;
            merged.set(kind, weight);
        }
        config.weights = merged;
    }

    if let Some(tiers) = raw.tiers {
        if let Some(green) = tiers.green {
            config.tiers.green = green;
        }
        if let Some(amber) = tiers.amber {
            config.tiers.amber = amber;
        }
    }

    if let Some(t) = raw.thresholds {
        let target = &mut config.thresholds;
        if let Some(days) = t.monthly_bucket_after_days {
            target.monthly_bucket_after_days = days;
        }
        if let Some(days) = t.duplicate_window_days {
            target.duplicate_window_days = days;
        }
        if let Some(mult) = t.spike_stddev_multiplier {
            target.spike_stddev_multiplier = mult;
        }
        if let Some(size) = t.small_category_size {
            target.small_category_size = size;
        }
        if let Some(size) = t.min_category_size {
            target.min_category_size = size;
        }
    }

    if let Some(import) = raw.import {
        if let Some(formats) = import.date_formats {
            config.import.date_formats = formats;
        }
        if let Some(formats) = import.datetime_formats {
            config.import.datetime_formats = formats;
        }
        if let Some(words) = import.vendor_words {
            config.import.vendor_words = words;
        }
    }

    if let Some(timeout) = raw.recommendations.and_then(|r| r.timeout_secs) {
        config.recommendation_timeout_secs = timeout;
    }

    if let Some(benchmarks) = raw.benchmarks {
        config.benchmarks = benchmarks;
    }

    if let Some(classification) = raw.classification {
        if let Some(essential) = classification.essential {
            config.classification.essential = essential;
        }
        if let Some(discretionary) = classification.discretionary {
            config.classification.discretionary = discretionary;
        }
    }

    config.validate()?;
    Ok(config)
}
