//! ECB reference rates (`eurofxref-hist.csv`)
//!
//! The ECB publishes one quote per business day as "USD per 1 EUR". The file is
//! refreshed outside of this crate; this module only reads it.
//!
//! Layout:
//!   Date,USD,JPY,BGN,...,
//!   2023-01-04,1.0599,140.05,1.9558,...,

use chrono::NaiveDate;
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::{Currency, RateOracle};
use crate::error::{ParseError, Result, TaxError};

const DATE_COLUMN: &str = "Date";
const USD_COLUMN: &str = "USD";

/// Daily EUR/USD reference rates with fallback to the previous published day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EcbRates {
    /// USD per 1 EUR, keyed by publication date
    usd_per_eur: BTreeMap<NaiveDate, Decimal>,
}

impl EcbRates {
    /// Build a table from (date, USD per EUR) pairs. Quotes that are not
    /// positive are dropped so lookups fall back to an earlier fixing.
    pub fn from_rates<I>(rates: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Decimal)>,
    {
        let usd_per_eur = rates
            .into_iter()
            .filter(|(date, quote)| {
                if *quote <= Decimal::ZERO {
                    warn!("Ignoring non-positive USD quote {} on {}", quote, date);
                    false
                } else {
                    true
                }
            })
            .collect();
        Self { usd_per_eur }
    }

    /// Read an ECB history CSV from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading ECB reference rates: {:?}", path);
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse the ECB history CSV layout
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers().map_err(ParseError::from)?.clone();
        let date_idx = column_index(&headers, DATE_COLUMN)?;
        let usd_idx = column_index(&headers, USD_COLUMN)?;

        let mut usd_per_eur = BTreeMap::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result.map_err(ParseError::from)?;
            let row = idx + 2;

            let date_str = record.get(date_idx).unwrap_or_default();
            if date_str.is_empty() {
                continue;
            }
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                ParseError::invalid_field(row, DATE_COLUMN, date_str, e.to_string())
            })?;

            // Days without a USD fixing are published as N/A
            let rate_str = record.get(usd_idx).unwrap_or_default();
            if rate_str.is_empty() || rate_str.eq_ignore_ascii_case("N/A") {
                continue;
            }
            let rate = Decimal::from_str(rate_str).map_err(|e| {
                ParseError::invalid_field(row, USD_COLUMN, rate_str, e.to_string())
            })?;
            if rate <= Decimal::ZERO {
                return Err(ParseError::invalid_field(
                    row,
                    USD_COLUMN,
                    rate_str,
                    "rate must be positive",
                )
                .into());
            }

            usd_per_eur.insert(date, rate);
        }

        info!("Loaded {} EUR/USD reference rates", usd_per_eur.len());
        Ok(Self { usd_per_eur })
    }

    pub fn len(&self) -> usize {
        self.usd_per_eur.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usd_per_eur.is_empty()
    }

    /// Quote valid on `date`: the exact day or the closest earlier one
    pub fn quote_on(&self, date: NaiveDate) -> Option<(NaiveDate, Decimal)> {
        self.usd_per_eur
            .range(..=date)
            .next_back()
            .map(|(d, rate)| (*d, *rate))
    }

    /// Factor turning a USD amount into EUR on `date`, with the date it was taken from
    pub fn usd_to_eur_factor(&self, date: NaiveDate) -> Result<(NaiveDate, Decimal)> {
        let (rate_date, quote) = self.lookup(Currency::Usd, Currency::Eur, date)?;
        Ok((rate_date, Decimal::ONE / quote))
    }

    fn lookup(
        &self,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<(NaiveDate, Decimal)> {
        let (rate_date, quote) = self
            .quote_on(date)
            .ok_or(TaxError::RateUnavailable { from, to, date })?;
        if rate_date != date {
            debug!("No ECB rate for {}, using {}", date, rate_date);
        }
        Ok((rate_date, quote))
    }
}

impl RateOracle for EcbRates {
    fn convert(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
        as_of: NaiveDate,
    ) -> Result<Decimal> {
        if from == to {
            return Ok(amount);
        }

        let (_, quote) = self.lookup(from, to, as_of)?;
        Ok(match (from, to) {
            (Currency::Usd, Currency::Eur) => amount / quote,
            _ => amount * quote,
        })
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}') == name)
        .ok_or_else(|| {
            ParseError::MissingColumn {
                column: name.to_string(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = "Date,USD,JPY,\n\
        2023-01-05,1.0526,140.09,\n\
        2023-01-04,1.0599,140.05,\n\
        2023-01-03,N/A,139.51,\n\
        2023-01-02,1.0683,140.98,\n";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_ecb_history() {
        let rates = EcbRates::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rates.len(), 3);
        assert_eq!(
            rates.quote_on(date(2023, 1, 4)),
            Some((date(2023, 1, 4), dec!(1.0599)))
        );
    }

    #[test]
    fn test_usd_to_eur_divides_by_quote() {
        let rates = EcbRates::from_reader(SAMPLE.as_bytes()).unwrap();
        let eur = rates
            .convert(dec!(105.99), Currency::Usd, Currency::Eur, date(2023, 1, 4))
            .unwrap();
        assert_eq!(eur, dec!(100));

        let usd = rates
            .convert(dec!(100), Currency::Eur, Currency::Usd, date(2023, 1, 4))
            .unwrap();
        assert_eq!(usd, dec!(105.99));
    }

    #[test]
    fn test_na_and_weekend_fall_back_to_prior_day() {
        let rates = EcbRates::from_reader(SAMPLE.as_bytes()).unwrap();
        // N/A on the 3rd -> rate of the 2nd
        assert_eq!(
            rates.quote_on(date(2023, 1, 3)),
            Some((date(2023, 1, 2), dec!(1.0683)))
        );
        // Saturday -> Thursday's fixing
        assert_eq!(
            rates.quote_on(date(2023, 1, 7)),
            Some((date(2023, 1, 5), dec!(1.0526)))
        );
    }

    #[test]
    fn test_no_rate_before_first_fixing() {
        let rates = EcbRates::from_reader(SAMPLE.as_bytes()).unwrap();
        let err = rates
            .convert(dec!(1), Currency::Usd, Currency::Eur, date(2022, 12, 30))
            .unwrap_err();
        assert!(matches!(err, TaxError::RateUnavailable { .. }));
    }

    #[test]
    fn test_same_currency_is_identity() {
        let rates = EcbRates::default();
        let eur = rates
            .convert(dec!(42.5), Currency::Eur, Currency::Eur, date(2023, 1, 4))
            .unwrap();
        assert_eq!(eur, dec!(42.5));
    }

    #[test]
    fn test_missing_usd_column() {
        let err = EcbRates::from_reader("Date,JPY\n2023-01-04,140.05\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            TaxError::Parse(ParseError::MissingColumn { ref column }) if column == "USD"
        ));
    }

    #[test]
    fn test_usd_to_eur_factor() {
        let rates = EcbRates::from_rates([(date(2023, 1, 2), dec!(1.25))]);
        let (rate_date, factor) = rates.usd_to_eur_factor(date(2023, 1, 9)).unwrap();
        assert_eq!(rate_date, date(2023, 1, 2));
        assert_eq!(factor, dec!(0.8));
    }

    #[test]
    fn test_non_positive_quotes_are_dropped() {
        let rates = EcbRates::from_rates([
            (date(2023, 1, 2), dec!(1.25)),
            (date(2023, 1, 3), dec!(0)),
            (date(2023, 1, 4), dec!(-1.1)),
        ]);
        assert_eq!(rates.len(), 1);

        let eur = rates
            .convert(dec!(100), Currency::Usd, Currency::Eur, date(2023, 1, 4))
            .unwrap();
        assert_eq!(eur, dec!(80));

        let only_zero = EcbRates::from_rates([(date(2023, 1, 3), Decimal::ZERO)]);
        let err = only_zero
            .convert(dec!(100), Currency::Usd, Currency::Eur, date(2023, 1, 3))
            .unwrap_err();
        assert!(matches!(err, TaxError::RateUnavailable { .. }));
    }

    #[test]
    fn test_zero_quote_in_file_is_rejected() {
        let err = EcbRates::from_reader("Date,USD,\n2023-01-04,0,\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            TaxError::Parse(ParseError::InvalidField { row: 2, ref column, .. }) if column == "USD"
        ));
    }
}
