//! Currency conversion module
//!
//! Provides USD -> EUR normalization of classified transactions:
//! - `RateOracle` capability injected by the caller
//! - Per-bucket reference dates (open date vs. close date)
//! - No rounding; totals are truncated later by the aggregator

pub mod ecb;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::Result;
use crate::models::{ClassifiedTransaction, ConvertedAmount, ConvertedTransaction};

pub use ecb::EcbRates;

/// Currencies known to the pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Currency {
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            _ => Err(()),
        }
    }
}

/// Historical exchange-rate lookup.
///
/// Implementations must answer for dates without a published rate by falling
/// back to the nearest earlier date, and return `TaxError::RateUnavailable`
/// only when nothing at or before `as_of` exists.
pub trait RateOracle {
    fn convert(&self, amount: Decimal, from: Currency, to: Currency, as_of: NaiveDate)
        -> Result<Decimal>;
}

impl<T: RateOracle + ?Sized> RateOracle for &T {
    fn convert(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
        as_of: NaiveDate,
    ) -> Result<Decimal> {
        (**self).convert(amount, from, to, as_of)
    }
}

/// Convert every bucket amount of a classified transaction from its own
/// currency to EUR, each at the rate of its own reference date. EUR amounts
/// pass through the oracle as an identity conversion.
pub fn convert_transaction(
    classified: ClassifiedTransaction,
    oracle: &dyn RateOracle,
) -> Result<ConvertedTransaction> {
    let currency = classified.transaction.currency;
    let converted = classified
        .amounts
        .iter()
        .map(|bucket_amount| {
            let amount_eur = oracle.convert(
                bucket_amount.amount,
                currency,
                Currency::Eur,
                bucket_amount.reference_date,
            )?;
            debug!(
                "row {}: {} {} {} -> {} EUR (as of {})",
                classified.transaction.row,
                bucket_amount.bucket.label(),
                bucket_amount.amount,
                currency,
                amount_eur,
                bucket_amount.reference_date
            );
            Ok(ConvertedAmount {
                bucket: bucket_amount.bucket,
                reference_date: bucket_amount.reference_date,
                amount: bucket_amount.amount,
                amount_eur,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ConvertedTransaction {
        classified,
        converted,
    })
}
