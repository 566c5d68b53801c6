use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info};

use super::{normalize_label, parse_decimal, BrokerAdapter, ParsedStatement};
use crate::currency::Currency;
use crate::error::ParseError;
use crate::models::{Broker, ClassifiedTransaction, InstrumentCategory, LongShort, Transaction};
use crate::tax::classifier;

/// Columns of the TastyTrade realized gain/loss export used by the classifier
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "TAX_YEAR",
    "SYMBOL",
    "SEC_SUBTYPE",
    "OPEN_DATE",
    "CLOSE_DATE",
    "CLOSE_EVENT",
    "QUANTITY",
    "LONG_SHORT_IND",
    "NO_WS_COST",
    "NO_WS_PROCEEDS",
    "NO_WS_GAINLOSS",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// `SEC_TYPE` / `SEC_SUBTYPE` words marking a row as not an option
const NON_OPTION_KEYWORDS: [&str; 11] = [
    "stock", "equity", "etf", "etn", "future", "futures", "crypto", "cryptocurrency",
    "bond", "fund", "warrant",
];

/// TastyTrade realized gain/loss CSV
#[derive(Debug, Clone, Copy, Default)]
pub struct TastyAdapter;

impl BrokerAdapter for TastyAdapter {
    fn broker(&self) -> Broker {
        Broker::TastyTrade
    }

    fn parse(&self, text: &str) -> Result<ParsedStatement, ParseError> {
        parse_tasty_statement(text)
    }

    fn classify(&self, transaction: Transaction) -> ClassifiedTransaction {
        classifier::classify_tasty(transaction)
    }
}

/// One row of the export, projected onto the required columns
#[derive(Debug, Deserialize)]
struct TastyRecord {
    #[serde(rename = "TAX_YEAR")]
    tax_year: String,
    #[serde(rename = "SYMBOL")]
    symbol: String,
    #[serde(rename = "SEC_TYPE", default)]
    sec_type: String,
    #[serde(rename = "SEC_SUBTYPE")]
    sec_subtype: String,
    #[serde(rename = "OPEN_DATE")]
    open_date: String,
    #[serde(rename = "CLOSE_DATE")]
    close_date: String,
    #[serde(rename = "CLOSE_EVENT")]
    close_event: String,
    #[serde(rename = "QUANTITY")]
    quantity: String,
    #[serde(rename = "LONG_SHORT_IND")]
    long_short: String,
    #[serde(rename = "NO_WS_COST")]
    cost: String,
    #[serde(rename = "NO_WS_PROCEEDS")]
    proceeds: String,
    #[serde(rename = "NO_WS_GAINLOSS")]
    gain_loss: String,
}

/// Parse a TastyTrade gain/loss export into normalized transactions
pub fn parse_tasty_statement(text: &str) -> Result<ParsedStatement, ParseError> {
    info!("Parsing TastyTrade gain/loss statement");

    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: StringRecord = reader.headers()?.iter().map(normalize_label).collect();
    debug!("CSV headers: {:?}", headers);

    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|column| !headers.iter().any(|h| h == **column))
    {
        return Err(ParseError::MissingColumn {
            column: missing.to_string(),
        });
    }

    let mut statement = ParsedStatement::default();
    for result in reader.records() {
        let record = result?;
        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();
        let raw: TastyRecord = record.deserialize(Some(&headers))?;
        let transaction = to_transaction(raw, row)?;

        if transaction.is_option() {
            statement.transactions.push(transaction);
        } else {
            debug!(
                "Skipping row {}: {} is not an option",
                row, transaction.symbol
            );
            statement.excluded_rows += 1;
        }
    }

    info!(
        "Parsed {} option transactions ({} other instrument rows skipped)",
        statement.transactions.len(),
        statement.excluded_rows
    );
    Ok(statement)
}

fn to_transaction(raw: TastyRecord, row: usize) -> Result<Transaction, ParseError> {
    let open_date = parse_date(row, "OPEN_DATE", &raw.open_date)?;
    let close_date = parse_date(row, "CLOSE_DATE", &raw.close_date)?;
    let quantity = parse_decimal(row, "QUANTITY", &raw.quantity)?;
    let cost = parse_decimal(row, "NO_WS_COST", &raw.cost)?;
    let proceeds = parse_decimal(row, "NO_WS_PROCEEDS", &raw.proceeds)?;
    let gain_loss = parse_decimal(row, "NO_WS_GAINLOSS", &raw.gain_loss)?;

    let long_short = LongShort::from_str(&raw.long_short).map_err(|_| {
        ParseError::invalid_field(row, "LONG_SHORT_IND", &raw.long_short, "expected L or S")
    })?;

    let tax_year = if raw.tax_year.is_empty() {
        None
    } else {
        Some(raw.tax_year.parse::<i32>().map_err(|e| {
            ParseError::invalid_field(row, "TAX_YEAR", &raw.tax_year, e.to_string())
        })?)
    };

    let category = instrument_category(&raw.sec_type, &raw.sec_subtype);

    Ok(Transaction {
        row,
        broker: Broker::TastyTrade,
        symbol: raw.symbol,
        currency: Currency::Usd,
        instrument_category: category,
        quantity,
        code: None,
        long_short: Some(long_short),
        realized_pnl: gain_loss,
        basis: None,
        cost: Some(cost),
        proceeds: Some(proceeds),
        executed_at: None,
        open_date,
        close_date,
        tax_year,
        sec_subtype: Some(raw.sec_subtype),
        close_event: Some(raw.close_event).filter(|e| !e.is_empty()),
    })
}

/// Rows are options unless the security type clearly names another
/// instrument. "Future Option" and friends stay options.
fn instrument_category(sec_type: &str, sec_subtype: &str) -> InstrumentCategory {
    let labels = format!("{} {}", sec_type, sec_subtype).to_lowercase();
    if labels.contains("option") {
        return InstrumentCategory::Options;
    }

    let is_other = NON_OPTION_KEYWORDS
        .iter()
        .any(|keyword| labels.split_whitespace().any(|word| word == *keyword));
    if is_other {
        InstrumentCategory::Other(labels.trim().to_string())
    } else {
        InstrumentCategory::Options
    }
}

fn parse_date(row: usize, column: &str, text: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| ParseError::invalid_field(row, column, text, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "TAX_YEAR,SYMBOL,SEC_TYPE,SEC_SUBTYPE,OPEN_DATE,CLOSE_DATE,CLOSE_EVENT,QUANTITY,LONG_SHORT_IND,NO_WS_COST,NO_WS_PROCEEDS,NO_WS_GAINLOSS,WASH_SALE";

    fn statement(rows: &[&str]) -> String {
        let mut text = format!("{}\n", HEADER);
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_parse_long_and_short_rows() {
        let text = statement(&[
            "2023,SPY 230120P00380000,Option,Equity Option,2023-01-03,2023-01-20,Buy to Close,1,S,$40.00,$100.00,$60.00,",
            "2023,AAPL 230317C00150000,Option,Equity Option,2023-02-01,2023-03-17,Expiration,2,L,$320.00,$0.00,-$320.00,",
        ]);
        let parsed = parse_tasty_statement(&text).unwrap();
        assert_eq!(parsed.transactions.len(), 2);
        assert_eq!(parsed.excluded_rows, 0);

        let short = &parsed.transactions[0];
        assert_eq!(short.row, 2);
        assert_eq!(short.long_short, Some(LongShort::Short));
        assert_eq!(short.cost, Some(dec!(40.00)));
        assert_eq!(short.proceeds, Some(dec!(100.00)));
        assert_eq!(short.open_date, NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
        assert_eq!(short.close_date, NaiveDate::from_ymd_opt(2023, 1, 20).unwrap());
        assert_eq!(short.tax_year, Some(2023));

        let long = &parsed.transactions[1];
        assert_eq!(long.realized_pnl, dec!(-320.00));
        assert_eq!(long.close_event.as_deref(), Some("Expiration"));
    }

    #[test]
    fn test_non_option_rows_are_excluded() {
        let text = statement(&[
            "2023,MSFT,Stock,Common Stock,2023-01-03,2023-02-10,Sell,10,L,$2300.00,$2600.00,$300.00,",
        ]);
        let parsed = parse_tasty_statement(&text).unwrap();
        assert!(parsed.transactions.is_empty());
        assert_eq!(parsed.excluded_rows, 1);
    }

    #[test]
    fn test_option_rows_without_option_subtype_are_kept() {
        let text = statement(&[
            "2023,SPY 230120P00380000,OPTION,PUT,2023-01-03,2023-01-20,Buy to Close,1,S,$40.00,$100.00,$60.00,",
            "2023,/ESH3 EW3H3 3900P,Future Option,Put,2023-02-01,2023-03-17,Expiration,1,L,$250.00,$0.00,-$250.00,",
            "2023,/ESH3,Future,,2023-02-01,2023-03-17,Sell,1,L,$4000.00,$4100.00,$100.00,",
            "2023,SPY,ETF,,2023-02-01,2023-03-17,Sell,5,L,$1900.00,$2000.00,$100.00,",
        ]);
        let parsed = parse_tasty_statement(&text).unwrap();
        assert_eq!(parsed.transactions.len(), 2);
        assert_eq!(parsed.excluded_rows, 2);
        assert!(parsed
            .transactions
            .iter()
            .all(|t| t.instrument_category == InstrumentCategory::Options));
        assert_eq!(parsed.transactions[0].proceeds, Some(dec!(100.00)));
        assert_eq!(parsed.transactions[1].row, 3);
    }

    #[test]
    fn test_instrument_category_from_security_type() {
        assert_eq!(instrument_category("", "Equity Option"), InstrumentCategory::Options);
        assert_eq!(instrument_category("OPTION", "CALL"), InstrumentCategory::Options);
        assert_eq!(instrument_category("", ""), InstrumentCategory::Options);
        assert_eq!(
            instrument_category("Stock", "Common Stock"),
            InstrumentCategory::Other("stock common stock".to_string())
        );
        assert_eq!(
            instrument_category("Cryptocurrency", ""),
            InstrumentCategory::Other("cryptocurrency".to_string())
        );
    }

    #[test]
    fn test_missing_column() {
        let text = "TAX_YEAR,SYMBOL,SEC_SUBTYPE,OPEN_DATE,CLOSE_DATE,CLOSE_EVENT,QUANTITY,NO_WS_COST,NO_WS_PROCEEDS,NO_WS_GAINLOSS\n";
        let err = parse_tasty_statement(text).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingColumn { ref column } if column == "LONG_SHORT_IND"
        ));
    }

    #[test]
    fn test_invalid_long_short_indicator() {
        let text = statement(&[
            "2023,SPY,Option,Equity Option,2023-01-03,2023-01-20,Buy to Close,1,X,$40.00,$100.00,$60.00,",
        ]);
        let err = parse_tasty_statement(&text).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidField { row: 2, ref column, .. } if column == "LONG_SHORT_IND"
        ));
    }

    #[test]
    fn test_invalid_date() {
        let text = statement(&[
            "2023,SPY,Option,Equity Option,01/03/2023,2023-01-20,Buy to Close,1,S,$40.00,$100.00,$60.00,",
        ]);
        let err = parse_tasty_statement(&text).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidField { ref column, .. } if column == "OPEN_DATE"
        ));
    }
}
