//! Export layout detection
//!
//! Inspects a table's header row and resolves a [`ColumnMapping`]. Known
//! accounting exports are tried first, in registry order; when none of them
//! fits, a keyword heuristic scans the headers. A caller-supplied mapping skips
//! detection entirely but is still checked against the headers.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{ColumnMapping, ColumnRef, Field};

/// Confidence multiplier for heuristic matches
const HEURISTIC_CONFIDENCE: f64 = 0.8;

/// Known export layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    QuickBooks,
    Xero,
    Wave,
    Revolut,
    Generic,
    /// Caller-supplied mapping
    Custom,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickBooks => "quickbooks",
            Self::Xero => "xero",
            Self::Wave => "wave",
            Self::Revolut => "revolut",
            Self::Generic => "generic",
            Self::Custom => "custom",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::QuickBooks => "QuickBooks",
            Self::Xero => "Xero",
            Self::Wave => "Wave",
            Self::Revolut => "Revolut",
            Self::Generic => "Generic",
            Self::Custom => "Custom mapping",
        }
    }

    /// Registered layouts in detection order
    pub fn registry() -> &'static [Layout] {
        &[
            Self::QuickBooks,
            Self::Xero,
            Self::Wave,
            Self::Revolut,
            Self::Generic,
        ]
    }

    /// Header aliases for a field, most preferred first
    pub fn aliases(&self, field: Field) -> &'static [&'static str] {
        match (self, field) {
            (Self::QuickBooks, Field::Date) => &["Date"],
            (Self::QuickBooks, Field::Description) => &["Description", "Memo"],
            (Self::QuickBooks, Field::Amount) => &["Amount"],
            (Self::QuickBooks, Field::Category) => &["Category"],
            (Self::QuickBooks, Field::Vendor) => &["Name", "Payee", "Vendor"],

            (Self::Xero, Field::Date) => &["Date"],
            (Self::Xero, Field::Description) => &["Description", "Reference"],
            (Self::Xero, Field::Amount) => &["Amount"],
            (Self::Xero, Field::Category) => &["Account", "Account Name"],
            (Self::Xero, Field::Vendor) => &["Payee", "Contact"],

            (Self::Wave, Field::Date) => &["Transaction Date"],
            (Self::Wave, Field::Description) => &["Description", "Transaction Description"],
            (Self::Wave, Field::Amount) => &["Amount"],
            (Self::Wave, Field::Category) => &["Account Name", "Category"],
            (Self::Wave, Field::Vendor) => &["Vendor", "Customer"],

            (Self::Revolut, Field::Date) => &["Started Date", "Completed Date"],
            (Self::Revolut, Field::Description) => &["Description"],
            (Self::Revolut, Field::Amount) => &["Amount"],
            (Self::Revolut, Field::Category) => &["Type"],
            (Self::Revolut, Field::Vendor) => &[],

            (Self::Generic, Field::Date) => &["date", "transaction date", "posted date", "posting date"],
            (Self::Generic, Field::Description) => &["description", "details", "narrative", "memo"],
            (Self::Generic, Field::Amount) => &["amount", "value", "total"],
            (Self::Generic, Field::Category) => &["category", "expense category"],
            (Self::Generic, Field::Vendor) => &["vendor", "merchant", "payee", "supplier"],

            (Self::Custom, _) => &[],
        }
    }

    /// Fields that must resolve for the layout to be eligible
    pub fn required(&self) -> &'static [Field] {
        match self {
            Self::QuickBooks => &[Field::Date, Field::Description, Field::Amount, Field::Category],
            Self::Xero => &[Field::Date, Field::Description, Field::Amount, Field::Category],
            Self::Wave | Self::Revolut => &[Field::Date, Field::Description, Field::Amount],
            Self::Generic => &[
                Field::Date,
                Field::Description,
                Field::Amount,
                Field::Category,
                Field::Vendor,
            ],
            Self::Custom => &[Field::Date, Field::Amount],
        }
    }
}

impl std::str::FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quickbooks" | "qb" => Ok(Self::QuickBooks),
            "xero" => Ok(Self::Xero),
            "wave" => Ok(Self::Wave),
            "revolut" => Ok(Self::Revolut),
            "generic" => Ok(Self::Generic),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Unknown layout: {}", s)),
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a mapping was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Registry,
    Heuristic,
    Explicit,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Heuristic => "heuristic",
            Self::Explicit => "explicit",
        }
    }
}

/// Result of format detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub layout: Layout,
    pub mapping: ColumnMapping,
    /// 0-1
    pub confidence: f64,
    pub method: DetectionMethod,
}

/// Lower-case a header and drop everything that is not alphanumeric
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Resolves column mappings from header rows
#[derive(Debug, Clone, Default)]
pub struct FormatDetector;

impl FormatDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect the layout of a header row
    pub fn detect(&self, headers: &[String]) -> Result<Detection> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

        let mut best: Option<(Layout, ColumnMapping, usize)> = None;
        for layout in Layout::registry() {
            let mapping = resolve_layout(*layout, &normalized);
            let eligible = layout.required().iter().all(|f| mapping.get(*f).is_some())
                && mapping.missing_mandatory().is_empty();
            if !eligible {
                continue;
            }

            let resolved = mapping.bound_count();
            debug!(layout = layout.as_str(), resolved, "Layout eligible");
            // Strictly greater keeps the earlier layout on ties
            if best.as_ref().map_or(true, |(_, _, r)| resolved > *r) {
                best = Some((*layout, mapping, resolved));
            }
        }

        if let Some((layout, mapping, resolved)) = best {
            return Ok(Detection {
                layout,
                mapping,
                confidence: resolved as f64 / Field::all().len() as f64,
                method: DetectionMethod::Registry,
            });
        }

        let mapping = resolve_heuristic(&normalized, headers);
        let missing = mapping.missing_mandatory();
        if !missing.is_empty() {
            return Err(Error::UnresolvableFormat {
                missing,
                headers: headers.to_vec(),
            });
        }

        let resolved = mapping.bound_count();
        debug!(resolved, "Resolved columns heuristically");
        Ok(Detection {
            layout: Layout::Generic,
            mapping,
            confidence: resolved as f64 / Field::all().len() as f64 * HEURISTIC_CONFIDENCE,
            method: DetectionMethod::Heuristic,
        })
    }

    /// Check a caller-supplied mapping against the headers
    ///
    /// Optional fields naming a column that does not exist are left unbound,
    /// so the normalizer derives or defaults them.
    pub fn explicit(&self, headers: &[String], mapping: &ColumnMapping) -> Result<Detection> {
        let mut missing = Vec::new();
        let mut resolved = ColumnMapping::new();
        for field in Field::all() {
            match mapping.get(*field) {
                Some(column) if column_index(headers, column).is_some() => {
                    resolved.set(*field, column.clone());
                }
                Some(column) if !field.is_mandatory() => {
                    warn!(
                        field = field.as_str(),
                        column = %column,
                        "Mapped column not found, leaving field unbound"
                    );
                }
                Some(_) => missing.push(*field),
                None if field.is_mandatory() => missing.push(*field),
                None => {}
            }
        }

        if !missing.is_empty() {
            return Err(Error::UnresolvableFormat {
                missing,
                headers: headers.to_vec(),
            });
        }

        Ok(Detection {
            layout: Layout::Custom,
            mapping: resolved,
            confidence: 1.0,
            method: DetectionMethod::Explicit,
        })
    }
}

/// Locate a referenced column. Names match case- and punctuation-insensitively.
pub fn column_index(headers: &[String], column: &ColumnRef) -> Option<usize> {
    match column {
        ColumnRef::Index(i) if *i < headers.len() => Some(*i),
        ColumnRef::Index(_) => None,
        ColumnRef::Name(name) => headers
            .iter()
            .position(|h| h == name)
            .or_else(|| {
                let wanted = normalize_header(name);
                headers.iter().position(|h| normalize_header(h) == wanted)
            }),
    }
}

/// Bind each field to the first header matching one of the layout's aliases
fn resolve_layout(layout: Layout, normalized: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();
    let mut used = vec![false; normalized.len()];

    for field in Field::all() {
        let found = layout.aliases(*field).iter().find_map(|alias| {
            let alias = normalize_header(alias);
            normalized
                .iter()
                .enumerate()
                .position(|(i, h)| !used[i] && *h == alias)
        });
        if let Some(index) = found {
            used[index] = true;
            mapping.set(*field, ColumnRef::Index(index));
        }
    }

    mapping
}

/// Match strength of a header against a keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchStrength {
    Substring = 1,
    Prefix = 2,
    Exact = 3,
}

fn heuristic_keywords(field: Field) -> &'static [&'static str] {
    match field {
        Field::Date => &["date"],
        Field::Amount => &["amount", "value", "total"],
        Field::Description => &["desc", "memo"],
        Field::Category => &["categ"],
        Field::Vendor => &["vendor", "payee", "merchant"],
    }
}

fn match_strength(header: &str, keyword: &str) -> Option<MatchStrength> {
    let tokens: Vec<String> = header
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();

    if tokens.iter().any(|t| t == keyword) {
        Some(MatchStrength::Exact)
    } else if tokens.iter().any(|t| t.starts_with(keyword)) {
        Some(MatchStrength::Prefix)
    } else if normalize_header(header).contains(keyword) {
        Some(MatchStrength::Substring)
    } else {
        None
    }
}

/// Keyword scan used when no registered layout is eligible
fn resolve_heuristic(normalized: &[String], headers: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();
    let mut used = vec![false; headers.len()];

    for field in Field::all() {
        let mut best: Option<(usize, MatchStrength)> = None;
        for (i, header) in headers.iter().enumerate() {
            if used[i] || normalized[i].is_empty() {
                continue;
            }
            let strength = heuristic_keywords(*field)
                .iter()
                .filter_map(|k| match_strength(header, k))
                .max();
            if let Some(strength) = strength {
                // Strictly stronger keeps the leftmost column on ties
                if best.map_or(true, |(_, s)| strength > s) {
                    best = Some((i, strength));
                }
            }
        }
        if let Some((index, _)) = best {
            used[index] = true;
            mapping.set(*field, ColumnRef::Index(index));
        }
    }

    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Transaction Date"), "transactiondate");
        assert_eq!(normalize_header(" Account-Name "), "accountname");
        assert_eq!(normalize_header("Card No."), "cardno");
    }

    #[test]
    fn test_detect_quickbooks() {
        let detection = FormatDetector::new()
            .detect(&headers(&["Date", "Name", "Memo", "Category", "Amount"]))
            .unwrap();
        assert_eq!(detection.layout, Layout::QuickBooks);
        assert_eq!(detection.method, DetectionMethod::Registry);
        assert_eq!(detection.mapping.date, Some(ColumnRef::Index(0)));
        assert_eq!(detection.mapping.vendor, Some(ColumnRef::Index(1)));
        assert_eq!(detection.mapping.description, Some(ColumnRef::Index(2)));
        assert_eq!(detection.mapping.category, Some(ColumnRef::Index(3)));
        assert_eq!(detection.mapping.amount, Some(ColumnRef::Index(4)));
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_detect_xero() {
        let detection = FormatDetector::new()
            .detect(&headers(&["Date", "Contact", "Reference", "Account Name", "Amount"]))
            .unwrap();
        assert_eq!(detection.layout, Layout::Xero);
        assert_eq!(detection.mapping.category, Some(ColumnRef::Index(3)));
        assert_eq!(detection.mapping.vendor, Some(ColumnRef::Index(1)));
    }

    #[test]
    fn test_detect_wave() {
        let detection = FormatDetector::new()
            .detect(&headers(&[
                "Transaction Date",
                "Transaction Description",
                "Amount",
                "Account Name",
            ]))
            .unwrap();
        assert_eq!(detection.layout, Layout::Wave);
        assert_eq!(detection.mapping.category, Some(ColumnRef::Index(3)));
        assert_eq!(detection.mapping.vendor, None);
        assert!((detection.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_detect_revolut_prefers_started_date() {
        let detection = FormatDetector::new()
            .detect(&headers(&[
                "Type",
                "Product",
                "Completed Date",
                "Started Date",
                "Description",
                "Amount",
                "Fee",
                "Currency",
            ]))
            .unwrap();
        assert_eq!(detection.layout, Layout::Revolut);
        assert_eq!(detection.mapping.date, Some(ColumnRef::Index(3)));
        assert_eq!(detection.mapping.category, Some(ColumnRef::Index(0)));
    }

    #[test]
    fn test_detect_generic() {
        let detection = FormatDetector::new()
            .detect(&headers(&["Posted Date", "Details", "Value", "Category", "Merchant"]))
            .unwrap();
        assert_eq!(detection.layout, Layout::Generic);
        assert_eq!(detection.method, DetectionMethod::Registry);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_detect_case_and_punctuation_insensitive() {
        let detection = FormatDetector::new()
            .detect(&headers(&["DATE", "description", "AMOUNT", "category", "vendor"]))
            .unwrap();
        // Generic also resolves all five fields; QuickBooks is earlier in the registry
        assert_eq!(detection.layout, Layout::QuickBooks);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_tie_goes_to_registry_order() {
        // QuickBooks and Xero both resolve date, description, amount, category
        let detection = FormatDetector::new()
            .detect(&headers(&["Date", "Description", "Amount", "Category", "Account"]))
            .unwrap();
        assert_eq!(detection.layout, Layout::QuickBooks);
    }

    #[test]
    fn test_heuristic_fallback_minimal_headers() {
        let detection = FormatDetector::new()
            .detect(&headers(&["Date", "Description", "Amount"]))
            .unwrap();
        assert_eq!(detection.method, DetectionMethod::Heuristic);
        assert_eq!(detection.layout, Layout::Generic);
        assert_eq!(detection.mapping.date, Some(ColumnRef::Index(0)));
        assert_eq!(detection.mapping.description, Some(ColumnRef::Index(1)));
        assert_eq!(detection.mapping.amount, Some(ColumnRef::Index(2)));
        assert_eq!(detection.mapping.category, None);
    }

    #[test]
    fn test_heuristic_prefers_exact_token() {
        let detection = FormatDetector::new()
            .detect(&headers(&["Updated", "Posting Date", "Total Value", "Amount"]))
            .unwrap();
        assert_eq!(detection.mapping.date, Some(ColumnRef::Index(1)));
        // "Total Value" and "Amount" are both exact; leftmost wins
        assert_eq!(detection.mapping.amount, Some(ColumnRef::Index(2)));
    }

    #[test]
    fn test_heuristic_one_column_per_field() {
        let detection = FormatDetector::new()
            .detect(&headers(&["Date", "Amount", "Total"]))
            .unwrap();
        assert_eq!(detection.mapping.amount, Some(ColumnRef::Index(1)));
        assert_eq!(detection.mapping.date, Some(ColumnRef::Index(0)));
    }

    #[test]
    fn test_unresolvable_format() {
        let err = FormatDetector::new()
            .detect(&headers(&["Foo", "Bar"]))
            .unwrap_err();
        match err {
            Error::UnresolvableFormat { missing, headers } => {
                assert_eq!(missing, vec![Field::Date, Field::Amount]);
                assert_eq!(headers, vec!["Foo".to_string(), "Bar".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_amount_unresolvable() {
        let err = FormatDetector::new()
            .detect(&headers(&["Date", "Description"]))
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableFormat { ref missing, .. } if missing == &vec![Field::Amount]));
    }

    #[test]
    fn test_explicit_mapping() {
        let mapping = ColumnMapping::new()
            .with(Field::Date, "Posted")
            .with(Field::Amount, 2usize)
            .with(Field::Description, "memo");
        let detection = FormatDetector::new()
            .explicit(&headers(&["Posted", "Memo", "Value"]), &mapping)
            .unwrap();
        assert_eq!(detection.method, DetectionMethod::Explicit);
        assert_eq!(detection.layout, Layout::Custom);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_explicit_mapping_missing_column() {
        let mapping = ColumnMapping::new()
            .with(Field::Date, "Posted")
            .with(Field::Amount, 7usize);
        let err = FormatDetector::new()
            .explicit(&headers(&["Posted", "Memo", "Value"]), &mapping)
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableFormat { ref missing, .. } if missing == &vec![Field::Amount]));
    }

    #[test]
    fn test_explicit_mapping_missing_optional_column() {
        let mapping = ColumnMapping::new()
            .with(Field::Date, "Posted")
            .with(Field::Amount, "Value")
            .with(Field::Description, "Memo")
            .with(Field::Category, "Cat");
        let detection = FormatDetector::new()
            .explicit(&headers(&["Posted", "Memo", "Value"]), &mapping)
            .unwrap();
        assert_eq!(detection.method, DetectionMethod::Explicit);
        assert!(detection.mapping.get(Field::Category).is_none());
        assert_eq!(
            detection.mapping.get(Field::Description),
            Some(&ColumnRef::Name("Memo".to_string()))
        );
    }

    #[test]
    fn test_explicit_mapping_unbound_date() {
        let mapping = ColumnMapping::new().with(Field::Amount, "Value");
        let err = FormatDetector::new()
            .explicit(&headers(&["Posted", "Value"]), &mapping)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("QuickBooks".parse::<Layout>().unwrap(), Layout::QuickBooks);
        assert_eq!("qb".parse::<Layout>().unwrap(), Layout::QuickBooks);
        assert!("sage".parse::<Layout>().is_err());
    }
}
