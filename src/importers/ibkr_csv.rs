use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord};
use std::str::FromStr;
use tracing::{debug, info};

use super::{normalize_label, parse_decimal, BrokerAdapter, ParsedStatement};
use crate::currency::Currency;
use crate::error::ParseError;
use crate::models::{Broker, ClassifiedTransaction, InstrumentCategory, Transaction};
use crate::tax::classifier;

/// First field of every row in the trades section of the activity statement
pub const SECTION_MARKER: &str = "Transaktionen";
/// Asset category of stock and index options
pub const OPTIONS_CATEGORY: &str = "Aktien- und Indexoptionen";

const DATA_ROW: &str = "Data";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d, %H:%M:%S";

const COL_HEADER: &str = "Header";
const COL_CATEGORY: &str = "Vermögenswertkategorie";
const COL_TIMESTAMP: &str = "Datum/Zeit";
const COL_QUANTITY: &str = "Menge";
const COL_BASIS: &str = "Basis";
const COL_REALIZED: &str = "Realisierter G&V";
const COL_CODE: &str = "Code";
const COL_SYMBOL: &str = "Symbol";
const COL_CURRENCY: &str = "Währung";

/// Interactive Brokers activity statement (German CSV export)
#[derive(Debug, Clone, Copy, Default)]
pub struct IbkrAdapter;

impl BrokerAdapter for IbkrAdapter {
    fn broker(&self) -> Broker {
        Broker::Ibkr
    }

    fn parse(&self, text: &str) -> Result<ParsedStatement, ParseError> {
        parse_ibkr_statement(text)
    }

    fn classify(&self, transaction: Transaction) -> ClassifiedTransaction {
        classifier::classify_ibkr(transaction)
    }
}

/// Extract options trades from the `Transaktionen` section of an IBKR statement
pub fn parse_ibkr_statement(text: &str) -> Result<ParsedStatement, ParseError> {
    info!("Parsing IBKR activity statement");

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // Every statement section has its own width
        .from_reader(text.as_bytes());

    let mut section = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.get(0).map(normalize_label).as_deref() == Some(SECTION_MARKER) {
            section.push(record);
        }
    }

    let (header, rows) = section
        .split_first()
        .ok_or_else(|| ParseError::MissingSection {
            marker: SECTION_MARKER.to_string(),
        })?;

    let mapping = find_columns(header)?;
    debug!("Column mapping: {:?}", mapping);

    let mut statement = ParsedStatement::default();
    for record in rows {
        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();

        match parse_row(record, &mapping, row)? {
            ParsedRow::Option(transaction) => statement.transactions.push(transaction),
            ParsedRow::OtherInstrument(category) => {
                debug!("Skipping row {}: asset category '{}'", row, category);
                statement.excluded_rows += 1;
            }
            ParsedRow::NotData => continue,
        }
    }

    info!(
        "Parsed {} option transactions ({} other instrument rows skipped)",
        statement.transactions.len(),
        statement.excluded_rows
    );
    Ok(statement)
}

#[derive(Debug)]
struct IbkrColumnMapping {
    header: usize,
    category: usize,
    timestamp: usize,
    quantity: usize,
    basis: usize,
    realized: usize,
    code: usize,
    symbol: Option<usize>,
    currency: Option<usize>,
}

fn find_columns(headers: &StringRecord) -> Result<IbkrColumnMapping, ParseError> {
    let names: Vec<String> = headers.iter().map(normalize_label).collect();
    let position = |name: &str| names.iter().position(|n| n == name);
    let required = |name: &str| {
        position(name).ok_or_else(|| ParseError::MissingColumn {
            column: name.to_string(),
        })
    };

    Ok(IbkrColumnMapping {
        header: required(COL_HEADER)?,
        category: required(COL_CATEGORY)?,
        timestamp: required(COL_TIMESTAMP)?,
        quantity: required(COL_QUANTITY)?,
        basis: required(COL_BASIS)?,
        realized: required(COL_REALIZED)?,
        code: required(COL_CODE)?,
        symbol: position(COL_SYMBOL),
        currency: position(COL_CURRENCY),
    })
}

enum ParsedRow {
    Option(Transaction),
    OtherInstrument(String),
    /// Header repeats, SubTotal and Total rows
    NotData,
}

fn parse_row(
    record: &StringRecord,
    mapping: &IbkrColumnMapping,
    row: usize,
) -> Result<ParsedRow, ParseError> {
    if record.get(mapping.header).map(str::trim) != Some(DATA_ROW) {
        return Ok(ParsedRow::NotData);
    }

    let category = normalize_label(field(record, mapping.category, COL_CATEGORY, row)?);
    if category != OPTIONS_CATEGORY {
        return Ok(ParsedRow::OtherInstrument(category));
    }

    let timestamp_str = field(record, mapping.timestamp, COL_TIMESTAMP, row)?;
    let executed_at = NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
        .map_err(|e| ParseError::invalid_field(row, COL_TIMESTAMP, timestamp_str, e.to_string()))?;

    let quantity = parse_decimal(row, COL_QUANTITY, field(record, mapping.quantity, COL_QUANTITY, row)?)?;
    let basis = parse_decimal(row, COL_BASIS, field(record, mapping.basis, COL_BASIS, row)?)?;
    let realized_pnl =
        parse_decimal(row, COL_REALIZED, field(record, mapping.realized, COL_REALIZED, row)?)?;
    let code = field(record, mapping.code, COL_CODE, row)?.to_string();

    let symbol = mapping
        .symbol
        .and_then(|idx| record.get(idx))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let currency = match mapping.currency.and_then(|idx| record.get(idx)).map(str::trim) {
        None | Some("") => Currency::Usd,
        Some(text) => Currency::from_str(text).map_err(|_| {
            ParseError::invalid_field(row, COL_CURRENCY, text, "expected USD or EUR")
        })?,
    };

    // Each row is a single leg, so its timestamp is both open and close reference
    let date = executed_at.date();

    Ok(ParsedRow::Option(Transaction {
        row,
        broker: Broker::Ibkr,
        symbol,
        currency,
        instrument_category: InstrumentCategory::Options,
        quantity,
        code: Some(code),
        long_short: None,
        realized_pnl,
        basis: Some(basis),
        cost: None,
        proceeds: None,
        executed_at: Some(executed_at),
        open_date: date,
        close_date: date,
        tax_year: None,
        sec_subtype: None,
        close_event: None,
    }))
}

fn field<'r>(
    record: &'r StringRecord,
    idx: usize,
    column: &str,
    row: usize,
) -> Result<&'r str, ParseError> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| ParseError::invalid_field(row, column, "", "missing value"))
}
