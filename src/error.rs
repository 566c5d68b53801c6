//! Error handling for options-tax
//!
//! Defines the typed errors of the statement pipeline. The library returns
//! [`Result`]; the binary wraps these in `anyhow` for context chaining.

use chrono::NaiveDate;
use thiserror::Error;

use crate::currency::Currency;

/// Malformed or unrecognized statement structure
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("section marker '{marker}' not found in statement")]
    MissingSection { marker: String },

    #[error("required column '{column}' not found")]
    MissingColumn { column: String },

    #[error("row {row}: invalid {column} value '{value}': {reason}")]
    InvalidField {
        row: usize,
        column: String,
        value: String,
        reason: String,
    },

    #[error("could not detect broker format: {0}")]
    UnknownFormat(String),

    #[error("csv error")]
    Csv(#[from] csv::Error),
}

impl ParseError {
    pub fn invalid_field(
        row: usize,
        column: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ParseError::InvalidField {
            row,
            column: column.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Core error types for the tax pipeline
#[derive(Error, Debug)]
pub enum TaxError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("no {from}/{to} rate available on or before {date}")]
    RateUnavailable {
        from: Currency,
        to: Currency,
        date: NaiveDate,
    },

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, TaxError>;
