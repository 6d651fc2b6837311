//! Domain models for SpendScore

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category assigned when the source has no category column or a blank cell
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Canonical transaction fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Date,
    Description,
    Amount,
    Category,
    Vendor,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Description => "description",
            Self::Amount => "amount",
            Self::Category => "category",
            Self::Vendor => "vendor",
        }
    }

    /// All canonical fields in resolution order
    pub fn all() -> &'static [Field] {
        &[
            Self::Date,
            Self::Amount,
            Self::Description,
            Self::Category,
            Self::Vendor,
        ]
    }

    /// Fields that must resolve for a table to be usable
    pub fn mandatory() -> &'static [Field] {
        &[Self::Date, Self::Amount]
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::Date | Self::Amount)
    }
}

impl std::str::FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(Self::Date),
            "description" | "desc" | "memo" => Ok(Self::Description),
            "amount" => Ok(Self::Amount),
            "category" => Ok(Self::Category),
            "vendor" | "payee" | "merchant" => Ok(Self::Vendor),
            _ => Err(format!("Unknown field: {}", s)),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to a source column, by header name or zero-based index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl From<&str> for ColumnRef {
    fn from(s: &str) -> Self {
        ColumnRef::Name(s.to_string())
    }
}

impl From<usize> for ColumnRef {
    fn from(i: usize) -> Self {
        ColumnRef::Index(i)
    }
}

impl std::str::FromStr for ColumnRef {
    type Err = String;

    /// `#3` selects column index 3; anything else is a header name
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Empty column reference".to_string());
        }
        match s.strip_prefix('#').map(|n| n.parse::<usize>()) {
            Some(Ok(index)) => Ok(ColumnRef::Index(index)),
            Some(Err(_)) => Err(format!("Invalid column index: {}", s)),
            None => Ok(ColumnRef::Name(s.to_string())),
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "#{}", i),
            ColumnRef::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Binding from canonical fields to source columns
///
/// Built by the format detector, or supplied by the caller to bypass detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<ColumnRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<ColumnRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<ColumnRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ColumnRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<ColumnRef>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style binding of a field
    pub fn with(mut self, field: Field, column: impl Into<ColumnRef>) -> Self {
        self.set(field, column.into());
        self
    }

    pub fn get(&self, field: Field) -> Option<&ColumnRef> {
        match field {
            Field::Date => self.date.as_ref(),
            Field::Description => self.description.as_ref(),
            Field::Amount => self.amount.as_ref(),
            Field::Category => self.category.as_ref(),
            Field::Vendor => self.vendor.as_ref(),
        }
    }

    pub fn set(&mut self, field: Field, column: ColumnRef) {
        let slot = match field {
            Field::Date => &mut self.date,
            Field::Description => &mut self.description,
            Field::Amount => &mut self.amount,
            Field::Category => &mut self.category,
            Field::Vendor => &mut self.vendor,
        };
        *slot = Some(column);
    }

    /// Number of canonical fields bound to a column
    pub fn bound_count(&self) -> usize {
        Field::all().iter().filter(|f| self.get(**f).is_some()).count()
    }

    /// Mandatory fields that are not bound
    pub fn missing_mandatory(&self) -> Vec<Field> {
        Field::mandatory()
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bound_count() == 0
    }
}

/// A canonical, validated transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub vendor: String,
}

impl Transaction {
    /// Spend magnitude, used for shares and ratios
    pub fn spend(&self) -> f64 {
        self.amount.abs()
    }

    /// Case-insensitive key for category lookups
    pub fn category_key(&self) -> String {
        category_key(&self.category)
    }

    /// Amount in whole cents, used for exact-amount comparisons
    pub fn cents(&self) -> i64 {
        (self.amount * 100.0).round() as i64
    }
}

/// Normalize a category name for table lookups
pub fn category_key(category: &str) -> String {
    category.trim().to_lowercase()
}

/// The six SpendScore sub-metrics, in breakdown order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Frequency,
    CategoryDiversity,
    BudgetAdherence,
    Redundancy,
    SpikeDetection,
    WasteRatio,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frequency => "frequency",
            Self::CategoryDiversity => "category_diversity",
            Self::BudgetAdherence => "budget_adherence",
            Self::Redundancy => "redundancy",
            Self::SpikeDetection => "spike_detection",
            Self::WasteRatio => "waste_ratio",
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Frequency => "Frequency Score",
            Self::CategoryDiversity => "Category Diversity",
            Self::BudgetAdherence => "Budget Adherence",
            Self::Redundancy => "Redundancy Detection",
            Self::SpikeDetection => "Spike Detection",
            Self::WasteRatio => "Waste Ratio",
        }
    }

    /// All metrics in breakdown order
    pub fn all() -> &'static [MetricKind] {
        &[
            Self::Frequency,
            Self::CategoryDiversity,
            Self::BudgetAdherence,
            Self::Redundancy,
            Self::SpikeDetection,
            Self::WasteRatio,
        ]
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "frequency" | "frequency_score" => Ok(Self::Frequency),
            "category_diversity" | "diversity" => Ok(Self::CategoryDiversity),
            "budget_adherence" | "budget" => Ok(Self::BudgetAdherence),
            "redundancy" | "redundancy_detection" => Ok(Self::Redundancy),
            "spike_detection" | "spikes" | "spike" => Ok(Self::SpikeDetection),
            "waste_ratio" | "waste" => Ok(Self::WasteRatio),
            _ => Err(format!("Unknown metric: {}", s)),
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction called out by a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedTransaction {
    /// Position in the analyzed transaction set
    pub index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub vendor: String,
    pub category: String,
    pub amount: f64,
    pub reason: String,
}

impl FlaggedTransaction {
    pub fn new(index: usize, tx: &Transaction, reason: impl Into<String>) -> Self {
        Self {
            index,
            date: tx.date,
            description: tx.description.clone(),
            vendor: tx.vendor.clone(),
            category: tx.category.clone(),
            amount: tx.amount,
            reason: reason.into(),
        }
    }
}

/// Supporting fact behind a metric score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
    /// A computed statistic or ratio
    Stat { label: String, value: f64 },
    /// A transaction flagged by the metric
    Flagged(FlaggedTransaction),
    /// Free-form note (defaults applied, degraded computation)
    Note { text: String },
}

impl Evidence {
    pub fn stat(label: impl Into<String>, value: f64) -> Self {
        Evidence::Stat {
            label: label.into(),
            value,
        }
    }

    pub fn note(text: impl Into<String>) -> Self {
        Evidence::Note { text: text.into() }
    }

    pub fn as_flagged(&self) -> Option<&FlaggedTransaction> {
        match self {
            Evidence::Flagged(f) => Some(f),
            _ => None,
        }
    }
}

/// Score and evidence for one sub-metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub kind: MetricKind,
    pub name: String,
    /// 0-100, where 100 is ideal
    pub score: f64,
    /// Percentage weight in the overall score
    pub weight: u32,
    pub evidence: Vec<Evidence>,
    /// True when the calculator failed and a default score was substituted
    #[serde(default)]
    pub degraded: bool,
}

impl MetricResult {
    /// Flagged transactions in evidence order
    pub fn flagged(&self) -> impl Iterator<Item = &FlaggedTransaction> {
        self.evidence.iter().filter_map(Evidence::as_flagged)
    }

    /// Look up a named statistic
    pub fn stat(&self, label: &str) -> Option<f64> {
        self.evidence.iter().find_map(|e| match e {
            Evidence::Stat { label: l, value } if l == label => Some(*value),
            _ => None,
        })
    }

    /// Weighted contribution to the overall score
    pub fn contribution(&self) -> f64 {
        self.score * self.weight as f64 / 100.0
    }
}

/// Traffic-light tier derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Green,
    Amber,
    Red,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Amber => "amber",
            Self::Red => "red",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Green => "Excellent",
            Self::Amber => "Good",
            Self::Red => "Needs Improvement",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Green => "Outstanding financial management",
            Self::Amber => "Good financial habits with room for improvement",
            Self::Red => "Significant opportunities for financial optimization",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate statistics over the validated transaction set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Signed sum of all amounts
    pub total_amount: f64,
    pub transaction_count: usize,
    pub category_count: usize,
    pub vendor_count: usize,
    pub mean_amount: f64,
    pub median_amount: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// 0-1 confidence based on volume, date span and category spread
    pub confidence: f64,
    /// Monthly spend trend, present when the set covers at least two months
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spend_trend: Option<SpendTrend>,
}

/// Direction of the monthly spend trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Flat,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Flat => "flat",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spend for one calendar month (`YYYY-MM`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySpend {
    pub month: String,
    pub spend: f64,
}

/// Linear trend over monthly spend with a one-month forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendTrend {
    /// Every month from first to last, empty months included
    pub months: Vec<MonthlySpend>,
    pub direction: TrendDirection,
    /// Least-squares slope, in spend per month
    pub monthly_change: f64,
    pub next_month_forecast: f64,
    /// Growth above a tenth of the average month
    pub significant_increase: bool,
}

/// The SpendScore result for one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendScoreReport {
    /// 0-100
    pub overall_score: u32,
    pub tier: Tier,
    pub breakdown: Vec<MetricResult>,
    pub reward_eligible: bool,
    pub summary_stats: SummaryStats,
}

impl SpendScoreReport {
    pub fn metric(&self, kind: MetricKind) -> Option<&MetricResult> {
        self.breakdown.iter().find(|m| m.kind == kind)
    }

    /// Metrics sorted by score ascending; ties keep breakdown order
    pub fn lowest_metrics(&self, n: usize) -> Vec<&MetricResult> {
        let mut sorted: Vec<&MetricResult> = self.breakdown.iter().collect();
        sorted.sort_by(|a, b| a.score.total_cmp(&b.score));
        sorted.truncate(n);
        sorted
    }
}

/// Essential vs discretionary spend classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Essentiality {
    Essential,
    Discretionary,
}

impl std::str::FromStr for Essentiality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "essential" => Ok(Self::Essential),
            "discretionary" | "non_essential" | "low_value" => Ok(Self::Discretionary),
            _ => Err(format!("Unknown classification: {}", s)),
        }
    }
}

/// Recommendation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Priorities assigned by rank (first = most urgent)
    pub fn by_rank() -> &'static [Priority] {
        &[Self::High, Self::Medium, Self::Low]
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" | "med" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a recommendation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    /// Produced by the text-generation backend
    Generated,
    /// Produced by the built-in rule-based generator
    Fallback,
}

/// A single prioritized suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub text: String,
    pub source: RecommendationSource,
}
