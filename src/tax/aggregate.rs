use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Broker, ConvertedTransaction, TaxBucket};

/// One reported total: truncated value for the tax form plus how it was derived
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportLine {
    pub label: String,
    /// Whole currency units, fractional part discarded
    pub value: Decimal,
    /// Untruncated sum
    pub exact: Decimal,
    pub currency: String,
    pub description: String,
}

/// Anlage KAP totals for one statement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxSummary {
    /// Zeile 21: Stillhaltereinkünfte und Gewinne aus Termingeschäften
    pub line21: ReportLine,
    /// Zeile 24: Verluste aus Termingeschäften (positive magnitude)
    pub line24: ReportLine,
    /// Broker-reported realized P&L in USD, as a cross-check
    pub control_total: ReportLine,
}

/// Truncate toward zero to whole units (105.98 -> 105, -105.98 -> -105)
pub fn truncate(value: Decimal) -> Decimal {
    let truncated = value.trunc();
    // -0.4 truncates to a signed zero
    if truncated.is_zero() {
        Decimal::ZERO
    } else {
        truncated
    }
}

/// Split Termingeschäfte amounts into (sum of gains, sum of losses).
/// Losses are returned as a negative sum.
pub fn split_by_sign<I>(amounts: I) -> (Decimal, Decimal)
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(gains, losses), amount| {
            if amount > Decimal::ZERO {
                (gains + amount, losses)
            } else {
                (gains, losses + amount)
            }
        })
}

/// Sum converted amounts into the two tax-form lines and the control total
pub fn aggregate(broker: Broker, transactions: &[ConvertedTransaction]) -> TaxSummary {
    let stillhalter: Decimal = transactions
        .iter()
        .flat_map(|tx| tx.converted.iter())
        .filter(|c| c.bucket.is_stillhalter())
        .map(|c| c.amount_eur)
        .sum();

    let (gains, losses) = split_by_sign(
        transactions
            .iter()
            .filter_map(|tx| tx.amount_eur(TaxBucket::Termingeschaefte)),
    );

    let control: Decimal = transactions
        .iter()
        .map(|tx| tx.transaction().realized_pnl)
        .sum();

    let line21 = stillhalter + gains;

    TaxSummary {
        line21: ReportLine {
            label: "Zeile 21: Stillhaltereinkünfte und Gewinne aus Termingeschäften".to_string(),
            value: truncate(line21),
            exact: line21,
            currency: "EUR".to_string(),
            description: line21_description(broker).to_string(),
        },
        line24: ReportLine {
            label: "Zeile 24: Verluste aus Termingeschäften".to_string(),
            value: Decimal::ZERO - truncate(losses),
            exact: Decimal::ZERO - losses,
            currency: "EUR".to_string(),
            description: "Summe aller negativen Werte aus Spalte 'GuV Termingeschäfte EUR'"
                .to_string(),
        },
        control_total: ReportLine {
            label: "Kontrollsumme: Realisierter G&V laut Broker".to_string(),
            value: truncate(control),
            exact: control,
            currency: "USD".to_string(),
            description: control_description(broker).to_string(),
        },
    }
}

fn line21_description(broker: Broker) -> &'static str {
    match broker {
        Broker::Ibkr => {
            "Summe Spalte 'GuV Stillhaltergeschäfte EUR' + Summe aller positiven Werte aus Spalte 'GuV Termingeschäfte EUR'"
        }
        Broker::TastyTrade => {
            "Summe Spalte 'GuV Stillhaltergeschäfte open EUR' + Summe Spalte 'GuV Stillhaltergeschäfte close EUR' + Summe aller positiven Werte aus Spalte 'GuV Termingeschäfte EUR'"
        }
    }
}

fn control_description(broker: Broker) -> &'static str {
    match broker {
        Broker::Ibkr => "Summe Spalte 'Realisierter G&V' (USD, nicht umgerechnet)",
        Broker::TastyTrade => "Summe Spalte 'NO_WS_GAINLOSS' (USD, nicht umgerechnet)",
    }
}

/// Shown with every report: only options are covered
pub const DISCLAIMER: &str = "Achtung: GuV aus Geschäften mit Aktien, Indizes, Futures und Devisen \
     sowie Dividenden und Zinsen werden nicht berücksichtigt.";

/// Trade types, bucket rules and conversion dates, one line each
pub fn legend(broker: Broker) -> &'static [&'static str] {
    match broker {
        Broker::Ibkr => &[
            "BTO: Menge > 0 und Code O",
            "STC: Menge < 0 und Code C",
            "STO: Menge < 0 und Code O",
            "BTC: Menge > 0 und Code C",
            "GuV Termingeschäfte: Wert aus Spalte 'Realisierter G&V' wenn STC",
            "GuV Stillhaltergeschäfte: Negativer Wert aus Spalte 'Basis' wenn STO oder Differenz aus 'Realisierter G&V' und 'Basis' wenn BTC",
            "GuV aus Stillhaltergeschäften werden zum Zeitpunkt der Vereinnahmung bzw. Glattstellung tagesaktuell in EUR umgerechnet (STO bzw. BTC).",
            "GuV aus Termingeschäften werden zum Zeitpunkt der Schließung des Geschäfts tagesaktuell in EUR umgerechnet (STC).",
        ],
        Broker::TastyTrade => &[
            "GuV Termingeschäfte: Wert aus Spalte 'NO_WS_GAINLOSS' wenn LONG_SHORT_IND = L",
            "GuV Stillhaltergeschäfte open: Wert aus Spalte 'NO_WS_PROCEEDS' wenn LONG_SHORT_IND = S",
            "GuV Stillhaltergeschäfte close: Negativer Wert aus Spalte 'NO_WS_COST' wenn LONG_SHORT_IND = S",
            "GuV aus Stillhaltergeschäften werden zum Zeitpunkt der Vereinnahmung bzw. Glattstellung tagesaktuell in EUR umgerechnet (OPEN_DATE bzw. CLOSE_DATE).",
            "GuV aus Termingeschäften werden zum Zeitpunkt der Schließung des Geschäfts tagesaktuell in EUR umgerechnet (CLOSE_DATE).",
        ],
    }
}
