// Import module - IBKR and TastyTrade statement parsers

pub mod file_detector;
pub mod ibkr_csv;
pub mod tasty_csv;

use rust_decimal::Decimal;
use std::borrow::Cow;
use std::str::FromStr;
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

use crate::error::ParseError;
use crate::models::{Broker, ClassifiedTransaction, Transaction};

pub use file_detector::detect_broker;
pub use ibkr_csv::IbkrAdapter;
pub use tasty_csv::TastyAdapter;

/// Options transactions parsed from one statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStatement {
    pub transactions: Vec<Transaction>,
    /// Data rows of other instruments (stocks, futures, FX...) left out
    pub excluded_rows: usize,
}

/// Per-broker capability used by the statement pipeline
pub trait BrokerAdapter {
    fn broker(&self) -> Broker;

    /// Turn the statement text into normalized options transactions
    fn parse(&self, text: &str) -> Result<ParsedStatement, ParseError>;

    /// Assign trade type and unconverted tax-bucket amounts
    fn classify(&self, transaction: Transaction) -> ClassifiedTransaction;
}

/// Adapter for the given broker format
pub fn adapter_for(broker: Broker) -> &'static dyn BrokerAdapter {
    match broker {
        Broker::Ibkr => &IbkrAdapter,
        Broker::TastyTrade => &TastyAdapter,
    }
}

/// Decode uploaded statement bytes.
///
/// UTF-8 (with or without BOM) is expected; anything else is read as
/// Windows-1252, which older IBKR exports use.
pub fn decode_statement(bytes: &[u8]) -> Cow<'_, str> {
    let (text, had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return text;
    }

    warn!("Statement is not valid UTF-8, decoding as Windows-1252");
    let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
    text
}

/// Canonical form of a header or category label for comparisons
pub(crate) fn normalize_label(text: &str) -> String {
    text.trim_start_matches('\u{feff}').trim().nfc().collect()
}

/// Parse a money/quantity cell: strips `$`, thousands separators and spaces
pub(crate) fn parse_decimal(row: usize, column: &str, text: &str) -> Result<Decimal, ParseError> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();

    Decimal::from_str(&cleaned)
        .map_err(|e| ParseError::invalid_field(row, column, text, e.to_string()))
}
