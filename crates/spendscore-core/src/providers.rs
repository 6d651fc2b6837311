//! Benchmark and classification lookups
//!
//! Budget adherence and waste ratio depend on external tables. Both are
//! injected through traits so callers can back them with anything; the
//! table implementations here cover configuration files and the built-in
//! industry presets.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ClassificationConfig;
use crate::error::{Error, Result};
use crate::models::{category_key, Essentiality};

/// Expected share of spend per category
pub trait BenchmarkProvider: Send + Sync {
    /// Expected share (0-1) for a category, if known
    fn expected_share(&self, category: &str) -> Option<f64>;

    /// Acceptable share band for a category, if the source defines one
    fn expected_range(&self, _category: &str) -> Option<BenchmarkRange> {
        None
    }
}

/// Acceptable share band around an optimal share
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRange {
    pub min: f64,
    pub max: f64,
    pub optimal: f64,
}

impl BenchmarkRange {
    /// Distance from optimal still counted as on target
    const OPTIMAL_TOLERANCE: f64 = 0.05;

    pub const fn new(min: f64, max: f64, optimal: f64) -> Self {
        Self { min, max, optimal }
    }

    pub fn status(&self, actual: f64) -> BenchmarkStatus {
        if actual < self.min {
            BenchmarkStatus::Under
        } else if actual > self.max {
            BenchmarkStatus::Over
        } else if (actual - self.optimal).abs() < Self::OPTIMAL_TOLERANCE {
            BenchmarkStatus::Optimal
        } else {
            BenchmarkStatus::Good
        }
    }
}

/// Where an actual share falls against its [`BenchmarkRange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkStatus {
    Optimal,
    Good,
    Under,
    Over,
}

impl BenchmarkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::Good => "good",
            Self::Under => "under",
            Self::Over => "over",
        }
    }
}

impl std::fmt::Display for BenchmarkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Built-in industry benchmark presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Technology,
    ProfessionalServices,
    General,
}

const TECHNOLOGY: &[(&str, BenchmarkRange)] = &[
    ("software subscriptions", BenchmarkRange::new(0.15, 0.35, 0.25)),
    ("hardware", BenchmarkRange::new(0.10, 0.20, 0.15)),
    ("cloud services", BenchmarkRange::new(0.20, 0.40, 0.30)),
];

const PROFESSIONAL_SERVICES: &[(&str, BenchmarkRange)] = &[
    ("office supplies", BenchmarkRange::new(0.02, 0.08, 0.05)),
    ("travel", BenchmarkRange::new(0.05, 0.15, 0.10)),
    ("marketing", BenchmarkRange::new(0.10, 0.25, 0.18)),
];

const GENERAL: &[(&str, BenchmarkRange)] = &[
    ("utilities", BenchmarkRange::new(0.05, 0.12, 0.08)),
    ("insurance", BenchmarkRange::new(0.03, 0.10, 0.06)),
    ("professional services", BenchmarkRange::new(0.08, 0.20, 0.14)),
];

impl Industry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technology => "technology",
            Self::ProfessionalServices => "professional_services",
            Self::General => "general",
        }
    }

    pub fn all() -> &'static [Industry] {
        &[Self::Technology, Self::ProfessionalServices, Self::General]
    }

    /// Category bands for this industry
    pub fn ranges(&self) -> &'static [(&'static str, BenchmarkRange)] {
        match self {
            Self::Technology => TECHNOLOGY,
            Self::ProfessionalServices => PROFESSIONAL_SERVICES,
            Self::General => GENERAL,
        }
    }

    pub fn benchmarks(&self) -> BenchmarkTable {
        BenchmarkTable::from_industry(*self)
    }
}

impl std::str::FromStr for Industry {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "technology" | "tech" => Ok(Self::Technology),
            "professional_services" | "services" => Ok(Self::ProfessionalServices),
            "general" => Ok(Self::General),
            _ => Err(format!(
                "Unknown industry: {} (expected technology, professional_services or general)",
                s
            )),
        }
    }
}

impl std::fmt::Display for Industry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Essential vs discretionary classification per category
pub trait ClassificationProvider: Send + Sync {
    fn classify(&self, category: &str) -> Option<Essentiality>;
}

/// In-memory benchmark table, keyed case-insensitively
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkTable {
    shares: BTreeMap<String, f64>,
    ranges: BTreeMap<String, BenchmarkRange>,
}

impl BenchmarkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(shares: &BTreeMap<String, f64>) -> Self {
        let mut table = Self::new();
        for (category, share) in shares {
            table.insert(category, *share);
        }
        table
    }

    /// Optimal shares and bands from an industry preset
    pub fn from_industry(industry: Industry) -> Self {
        let mut table = Self::new();
        for (category, range) in industry.ranges() {
            table.insert_range(category, *range);
        }
        table
    }

    /// Set a plain expected share, dropping any band for the category
    pub fn insert(&mut self, category: &str, share: f64) {
        let key = category_key(category);
        self.ranges.remove(&key);
        self.shares.insert(key, share);
    }

    pub fn insert_range(&mut self, category: &str, range: BenchmarkRange) {
        let key = category_key(category);
        self.shares.insert(key.clone(), range.optimal);
        self.ranges.insert(key, range);
    }

    /// Overlay `other`; its entries win
    pub fn merge(&mut self, other: &BenchmarkTable) {
        for (key, share) in &other.shares {
            match other.ranges.get(key) {
                Some(range) => self.insert_range(key, *range),
                None => self.insert(key, *share),
            }
        }
    }

    /// Parse a TOML file with either a `[benchmarks]` table or top-level keys
    pub fn from_toml_str(content: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Wrapped {
            benchmarks: BTreeMap<String, f64>,
        }

        let shares = match toml::from_str::<Wrapped>(content) {
            Ok(wrapped) => wrapped.benchmarks,
            Err(_) => toml::from_str::<BTreeMap<String, f64>>(content)
                .map_err(|e| Error::InvalidConfig(format!("Invalid benchmark TOML: {}", e)))?,
        };

        if let Some((category, share)) = shares.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "benchmark for '{}' is not a number: {}",
                category, share
            )));
        }

        Ok(Self::from_map(&shares))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("Failed to read benchmarks {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}

impl BenchmarkProvider for BenchmarkTable {
    fn expected_share(&self, category: &str) -> Option<f64> {
        self.shares.get(&category_key(category)).copied()
    }

    fn expected_range(&self, category: &str) -> Option<BenchmarkRange> {
        self.ranges.get(&category_key(category)).copied()
    }
}

/// In-memory classification table, keyed case-insensitively
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationTable {
    entries: BTreeMap<String, Essentiality>,
}

impl ClassificationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shipped essential/discretionary lists
    pub fn standard() -> Self {
        Self::from_config(&ClassificationConfig::default())
    }

    pub fn from_config(config: &ClassificationConfig) -> Self {
        let mut table = Self::new();
        for category in &config.essential {
            table.insert(category, Essentiality::Essential);
        }
        for category in &config.discretionary {
            table.insert(category, Essentiality::Discretionary);
        }
        table
    }

    pub fn insert(&mut self, category: &str, class: Essentiality) {
        self.entries.insert(category_key(category), class);
    }

    /// Parse `essential = [...]` / `discretionary = [...]`, optionally under
    /// a `[classification]` table
    pub fn from_toml_str(content: &str) -> Result<Self> {
        #[derive(Deserialize, Default)]
        struct Lists {
            #[serde(default)]
            essential: Vec<String>,
            #[serde(default)]
            discretionary: Vec<String>,
        }

        #[derive(Deserialize)]
        struct Wrapped {
            classification: Lists,
        }

        let lists = match toml::from_str::<Wrapped>(content) {
            Ok(wrapped) => wrapped.classification,
            Err(_) => toml::from_str::<Lists>(content)
                .map_err(|e| Error::InvalidConfig(format!("Invalid classification TOML: {}", e)))?,
        };

        Ok(Self::from_config(&ClassificationConfig {
            essential: lists.essential,
            discretionary: lists.discretionary,
        }))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to read classification {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ClassificationProvider for ClassificationTable {
    fn classify(&self, category: &str) -> Option<Essentiality> {
        self.entries.get(&category_key(category)).copied()
    }
}
