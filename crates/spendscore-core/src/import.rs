//! Raw table input and row normalization
//!
//! [`RawTable`] holds string cells from a CSV export or a JSON array of
//! objects. [`Normalizer`] applies a resolved [`ColumnMapping`] and turns each
//! row into a canonical [`Transaction`], or records why it was rejected.

use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::formats::column_index;
use crate::models::{ColumnMapping, Field, Transaction, UNCATEGORIZED};

/// Payment processor prefixes that vary per transaction
const PAYMENT_PREFIXES: &[&str] = &[
    "APLPAY ", "APPLEPAY ", "SQ *", "SQ*", "TST*", "SP *", "SP*", "PAYPAL *", "PP*",
];

/// Headers plus string cells, as read from the source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read CSV data (header row required, ragged rows allowed)
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        // Cells are decoded lossily so one badly encoded row cannot fail the read
        let headers: Vec<String> = rdr
            .byte_headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = String::from_utf8_lossy(h);
                if i == 0 {
                    h.trim_start_matches('\u{feff}').trim().to_string()
                } else {
                    h.into_owned()
                }
            })
            .collect();

        let mut rows = Vec::new();
        for result in rdr.byte_records() {
            let record = result?;
            rows.push(
                record
                    .iter()
                    .map(|c| String::from_utf8_lossy(c).into_owned())
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }

    pub fn from_csv_str(data: &str) -> Result<Self> {
        Self::from_csv_reader(data.as_bytes())
    }

    /// Parse a JSON array of flat objects
    pub fn from_json_str(data: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(data)?;
        Self::from_json_value(&value)
    }

    pub fn from_json_value(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::InvalidData("Expected a JSON array of objects".into()))?;

        let mut keys = BTreeSet::new();
        let mut objects = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let object = item.as_object().ok_or_else(|| {
                Error::InvalidData(format!("Element {} is not a JSON object", i + 1))
            })?;
            keys.extend(object.keys().cloned());
            objects.push(object);
        }

        let headers: Vec<String> = keys.into_iter().collect();
        let rows = objects
            .iter()
            .map(|object| {
                headers
                    .iter()
                    .map(|h| object.get(h).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(Self { headers, rows })
    }

    /// Load a file, choosing JSON or CSV by extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&fs::read_to_string(path)?)
        } else {
            Self::from_csv_reader(fs::File::open(path)?)
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// A row that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub reason: String,
}

/// Valid transactions plus rejected rows, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRows {
    pub transactions: Vec<Transaction>,
    pub rejections: Vec<Rejection>,
}

impl NormalizedRows {
    pub fn rejected(&self) -> usize {
        self.rejections.len()
    }
}

/// Column indices resolved from a mapping
struct ResolvedColumns {
    date: usize,
    amount: usize,
    description: Option<usize>,
    category: Option<usize>,
    vendor: Option<usize>,
}

/// Applies a column mapping and coerces rows into transactions
pub struct Normalizer<'a> {
    config: &'a ImportConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a ImportConfig) -> Self {
        Self { config }
    }

    /// Normalize every row of the table. Bad rows are rejected, never raised.
    pub fn normalize(&self, table: &RawTable, mapping: &ColumnMapping) -> Result<NormalizedRows> {
        let columns = resolve_columns(&table.headers, mapping)?;
        let mut out = NormalizedRows::default();

        for (i, row) in table.rows.iter().enumerate() {
            let row_number = i + 1;
            match self.normalize_row(row, &columns) {
                Ok(tx) => out.transactions.push(tx),
                Err(reason) => {
                    debug!(row = row_number, %reason, "Rejected row");
                    out.rejections.push(Rejection {
                        row: row_number,
                        reason,
                    });
                }
            }
        }

        debug!(
            valid = out.transactions.len(),
            rejected = out.rejected(),
            "Normalized rows"
        );
        Ok(out)
    }

    fn normalize_row(
        &self,
        row: &[String],
        columns: &ResolvedColumns,
    ) -> std::result::Result<Transaction, String> {
        let cell = |index: Option<usize>| cell_at(row, index);

        let date_str = cell(Some(columns.date));
        if date_str.is_empty() {
            return Err("missing date".into());
        }
        let date = parse_date(date_str, self.config)
            .map_err(|_| format!("unparsable date '{}'", date_str))?;

        let amount_str = cell(Some(columns.amount));
        if amount_str.is_empty() {
            return Err("missing amount".into());
        }
        let amount =
            parse_amount(amount_str).map_err(|_| format!("unparsable amount '{}'", amount_str))?;

        let vendor_cell = cell(columns.vendor);
        // Without a description column the vendor doubles as the description
        let description = match columns.description {
            Some(_) => cell(columns.description),
            None => vendor_cell,
        };
        if description.is_empty() {
            return Err("empty description".into());
        }

        let category = match cell(columns.category) {
            "" => UNCATEGORIZED.to_string(),
            c => c.to_string(),
        };

        let vendor = match vendor_cell {
            "" => derive_vendor(description, self.config.vendor_words),
            v => v.to_string(),
        };

        Ok(Transaction {
            date,
            description: description.to_string(),
            amount,
            category,
            vendor,
        })
    }
}

fn cell_at(row: &[String], index: Option<usize>) -> &str {
    index
        .and_then(|i| row.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

fn resolve_columns(headers: &[String], mapping: &ColumnMapping) -> Result<ResolvedColumns> {
    let lookup = |field: Field| mapping.get(field).and_then(|c| column_index(headers, c));

    let date = lookup(Field::Date);
    let amount = lookup(Field::Amount);
    match (date, amount) {
        (Some(date), Some(amount)) => Ok(ResolvedColumns {
            date,
            amount,
            description: lookup(Field::Description),
            category: lookup(Field::Category),
            vendor: lookup(Field::Vendor),
        }),
        _ => {
            let mut missing = Vec::new();
            if date.is_none() {
                missing.push(Field::Date);
            }
            if amount.is_none() {
                missing.push(Field::Amount);
            }
            Err(Error::UnresolvableFormat {
                missing,
                headers: headers.to_vec(),
            })
        }
    }
}

/// Parse a date using the configured formats, first match wins
pub fn parse_date(s: &str, config: &ImportConfig) -> Result<NaiveDate> {
    let s = s.trim();

    for fmt in &config.date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            // %Y also accepts two-digit years; leave those to %y
            if fmt.contains("%Y") && date.year() < 1000 {
                continue;
            }
            return Ok(date);
        }
    }

    for fmt in &config.datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            if fmt.contains("%Y") && dt.year() < 1000 {
                continue;
            }
            return Ok(dt.date());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }

    Err(Error::InvalidData(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency markers and separators
///
/// `(12.50)` and `12.50-` are negative.
pub fn parse_amount(s: &str) -> Result<f64> {
    let invalid = || Error::InvalidData(format!("Unable to parse amount: {}", s));

    let mut text = s.trim();
    let mut negative = false;
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        negative = true;
        text = inner.trim();
    }
    if let Some(inner) = text.strip_suffix('-') {
        negative = true;
        text = inner.trim();
    }

    let cleaned = strip_currency_codes(text)
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | '₹' | ',' | '\'') && !c.is_whitespace())
        .collect::<String>();

    if cleaned.is_empty() {
        return Err(invalid());
    }

    let value = cleaned.parse::<f64>().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }

    Ok(if negative { -value.abs() } else { value })
}

/// Remove runs of exactly three ASCII letters (USD, EUR, ...)
fn strip_currency_codes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run = String::new();

    for c in s.chars().chain(std::iter::once('\0')) {
        if c.is_ascii_alphabetic() {
            run.push(c);
            continue;
        }
        if run.len() != 3 {
            out.push_str(&run);
        }
        run.clear();
        if c != '\0' {
            out.push(c);
        }
    }

    out
}

/// Derive a vendor name from a bank description
///
/// Drops payment prefixes and numeric tokens (store numbers, references) and
/// keeps the first `words` significant words.
pub fn derive_vendor(description: &str, words: usize) -> String {
    let mut upper = description.trim().to_uppercase();
    for prefix in PAYMENT_PREFIXES {
        if let Some(rest) = upper.strip_prefix(prefix) {
            upper = rest.trim_start().to_string();
        }
    }

    let spaced: String = upper
        .chars()
        .filter(|c| *c != '\'')
        .map(|c| if c.is_alphanumeric() || c == '&' { c } else { ' ' })
        .collect();

    let vendor = spaced
        .split_whitespace()
        .filter(|word| !word.chars().all(|c| c.is_ascii_digit()))
        .take(words)
        .collect::<Vec<_>>()
        .join(" ");

    if vendor.is_empty() {
        description.trim().to_uppercase()
    } else {
        vendor
    }
}

/// Comparison key for vendor names
pub fn vendor_key(vendor: &str) -> String {
    vendor
        .to_uppercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
