use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::aggregate::{aggregate, TaxSummary};
use super::diagnostics::ClassificationGap;
use crate::currency::{convert_transaction, RateOracle};
use crate::error::Result;
use crate::importers::{adapter_for, decode_statement, BrokerAdapter};
use crate::models::{Broker, ConvertedTransaction, Transaction};

/// Result of processing one statement: the enriched table plus the totals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxReport {
    pub broker: Broker,
    /// One row per options transaction, including unclassified ones
    pub transactions: Vec<ConvertedTransaction>,
    pub summary: TaxSummary,
    /// Rows left out of the bucket sums
    pub gaps: Vec<ClassificationGap>,
    /// Non-option rows dropped before classification
    pub excluded_rows: usize,
}

impl TaxReport {
    pub fn unclassified_count(&self) -> usize {
        self.gaps.len()
    }
}

/// Run parse -> classify -> convert -> aggregate on raw statement bytes.
///
/// Parse errors and missing exchange rates abort the run. Rows that match no
/// classification rule are kept without bucket amounts and listed in `gaps`.
pub fn process_statement(
    adapter: &dyn BrokerAdapter,
    input: &[u8],
    oracle: &dyn RateOracle,
) -> Result<TaxReport> {
    let broker = adapter.broker();
    let text = decode_statement(input);
    let parsed = adapter.parse(&text)?;

    let (options, others): (Vec<Transaction>, Vec<Transaction>) = parsed
        .transactions
        .into_iter()
        .partition(Transaction::is_option);
    let excluded_rows = parsed.excluded_rows + others.len();

    let transactions = options
        .into_iter()
        .map(|transaction| convert_transaction(adapter.classify(transaction), oracle))
        .collect::<Result<Vec<_>>>()?;

    let gaps: Vec<ClassificationGap> = transactions
        .iter()
        .filter_map(|tx| tx.classified.gap.clone())
        .collect();
    if !gaps.is_empty() {
        warn!(
            "{} transactions could not be classified and are excluded from the totals",
            gaps.len()
        );
    }

    let summary = aggregate(broker, &transactions);
    info!(
        "{} statement: {} transactions, Zeile 21 = {} EUR, Zeile 24 = {} EUR",
        broker,
        transactions.len(),
        summary.line21.value,
        summary.line24.value
    );

    Ok(TaxReport {
        broker,
        transactions,
        summary,
        gaps,
        excluded_rows,
    })
}

/// Convenience wrapper selecting the adapter from the broker
pub fn process_statement_for(
    broker: Broker,
    input: &[u8],
    oracle: &dyn RateOracle,
) -> Result<TaxReport> {
    process_statement(adapter_for(broker), input, oracle)
}
