use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::currency::Currency;
use crate::tax::ClassificationGap;

/// Broker export formats understood by the importers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Broker {
    Ibkr,
    TastyTrade,
}

impl Broker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Broker::Ibkr => "IBKR",
            Broker::TastyTrade => "TastyTrade",
        }
    }
}

impl fmt::Display for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Broker {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IBKR" | "INTERACTIVE BROKERS" | "INTERACTIVEBROKERS" => Ok(Broker::Ibkr),
            "TASTY" | "TASTYTRADE" | "TASTYWORKS" => Ok(Broker::TastyTrade),
            _ => Err(()),
        }
    }
}

/// Instrument category of a statement row. Only options take part in the tax buckets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum InstrumentCategory {
    Options,
    Other(String),
}

/// Options trade type derived from quantity sign and open/close code
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TradeType {
    Bto, // buy to open (open long)
    Stc, // sell to close (close long)
    Sto, // sell to open (open short)
    Btc, // buy to close (close short)
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Bto => "BTO",
            TradeType::Stc => "STC",
            TradeType::Sto => "STO",
            TradeType::Btc => "BTC",
        }
    }
}

impl FromStr for TradeType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BTO" => Ok(TradeType::Bto),
            "STC" => Ok(TradeType::Stc),
            "STO" => Ok(TradeType::Sto),
            "BTC" => Ok(TradeType::Btc),
            _ => Err(()),
        }
    }
}

/// Position side reported by TastyTrade (`LONG_SHORT_IND`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LongShort {
    Long,
    Short,
}

impl LongShort {
    pub fn as_str(&self) -> &'static str {
        match self {
            LongShort::Long => "L",
            LongShort::Short => "S",
        }
    }
}

impl FromStr for LongShort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "LONG" => Ok(LongShort::Long),
            "S" | "SHORT" => Ok(LongShort::Short),
            _ => Err(()),
        }
    }
}

/// German tax bucket a gain/loss amount is reported under
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaxBucket {
    /// Gains/losses from closing long options
    Termingeschaefte,
    /// Single Stillhalter leg per IBKR row (STO premium or BTC result)
    Stillhalter,
    /// Premium received when the short position was opened
    StillhalterOpen,
    /// Cost paid when the short position was closed
    StillhalterClose,
}

impl TaxBucket {
    pub fn label(&self) -> &'static str {
        match self {
            TaxBucket::Termingeschaefte => "GuV Termingeschäfte",
            TaxBucket::Stillhalter => "GuV Stillhaltergeschäfte",
            TaxBucket::StillhalterOpen => "GuV Stillhaltergeschäfte open",
            TaxBucket::StillhalterClose => "GuV Stillhaltergeschäfte close",
        }
    }

    pub fn is_stillhalter(&self) -> bool {
        !matches!(self, TaxBucket::Termingeschaefte)
    }
}

/// Normalized, broker-agnostic statement row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Line number in the source file (1-indexed)
    pub row: usize,
    pub broker: Broker,
    pub symbol: String,
    /// Currency the broker reports the row's amounts in
    pub currency: Currency,
    pub instrument_category: InstrumentCategory,
    pub quantity: Decimal,
    /// IBKR `Code` column, e.g. "O" or "C;Ep"
    pub code: Option<String>,
    pub long_short: Option<LongShort>,
    /// Broker-reported realized gain/loss, in `currency`
    pub realized_pnl: Decimal,
    pub basis: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub proceeds: Option<Decimal>,
    pub executed_at: Option<NaiveDateTime>,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub tax_year: Option<i32>,
    pub sec_subtype: Option<String>,
    pub close_event: Option<String>,
}

impl Transaction {
    pub fn is_option(&self) -> bool {
        self.instrument_category == InstrumentCategory::Options
    }
}

/// An amount assigned to a tax bucket, with the date its EUR rate is taken from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketAmount {
    pub bucket: TaxBucket,
    pub amount: Decimal,
    pub reference_date: NaiveDate,
}

/// Transaction with its trade type and unconverted bucket amounts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifiedTransaction {
    pub transaction: Transaction,
    pub trade_type: Option<TradeType>,
    pub amounts: Vec<BucketAmount>,
    /// Set when the row matched none of the classification rules
    pub gap: Option<ClassificationGap>,
}

impl ClassifiedTransaction {
    pub fn amount(&self, bucket: TaxBucket) -> Option<Decimal> {
        self.amounts
            .iter()
            .find(|a| a.bucket == bucket)
            .map(|a| a.amount)
    }
}

/// One bucket amount after conversion to EUR
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConvertedAmount {
    pub bucket: TaxBucket,
    pub reference_date: NaiveDate,
    /// Amount in the transaction's own currency
    pub amount: Decimal,
    pub amount_eur: Decimal,
}

/// Fully enriched row: classification plus EUR amounts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvertedTransaction {
    pub classified: ClassifiedTransaction,
    pub converted: Vec<ConvertedAmount>,
}

impl ConvertedTransaction {
    pub fn transaction(&self) -> &Transaction {
        &self.classified.transaction
    }

    pub fn amount_eur(&self, bucket: TaxBucket) -> Option<Decimal> {
        self.converted
            .iter()
            .find(|c| c.bucket == bucket)
            .map(|c| c.amount_eur)
    }
}
