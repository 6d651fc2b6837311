//! Error types for SpendScore

use thiserror::Error;

use crate::models::Field;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unresolvable format: missing {} (headers: {})", join_fields(.missing), join_headers(.headers))]
    UnresolvableFormat {
        missing: Vec<Field>,
        headers: Vec<String>,
    },

    #[error(
        "Insufficient data: {valid} valid transactions (need at least {required}), {rejected} rows rejected"
    )]
    InsufficientData {
        valid: usize,
        rejected: usize,
        required: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Metric error: {0}")]
    Metric(String),

    #[error("AI backend error: {0}")]
    Ai(String),
}

impl Error {
    /// Whether this error ends the analysis (as opposed to being recovered locally)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::UnresolvableFormat { .. } | Error::InsufficientData { .. }
        )
    }
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_headers(headers: &[String]) -> String {
    headers.join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
