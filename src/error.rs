//! Error types for Inhaler Insights

use thiserror::Error;

/// Errors that can occur while ingesting data or loading configuration.
///
/// The analysis functions themselves are total; only conversions from stored
/// integers, JSON ingestion and configuration are fallible.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid {kind} value: {value}")]
    InvalidOrdinal { kind: &'static str, value: i64 },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl AnalysisError {
    pub(crate) fn invalid_ordinal(kind: &'static str, value: impl Into<i64>) -> Self {
        AnalysisError::InvalidOrdinal {
            kind,
            value: value.into(),
        }
    }
}
