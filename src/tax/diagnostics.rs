//! Classification diagnostics
//!
//! Rows that match none of the trade-type rules are not fatal. They stay in the
//! output table without bucket amounts and are collected here so the report can
//! show how many rows were left out of the totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Transaction;

/// A transaction the classifier could not assign to a trade type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationGap {
    /// Row number in the statement file (1-indexed for user display)
    pub row: usize,
    pub symbol: String,
    pub quantity: Decimal,
    pub code: Option<String>,
    /// Why no rule matched
    pub reason: String,
}

impl ClassificationGap {
    pub fn new(transaction: &Transaction, reason: impl Into<String>) -> Self {
        Self {
            row: transaction.row,
            symbol: transaction.symbol.clone(),
            quantity: transaction.quantity,
            code: transaction.code.clone(),
            reason: reason.into(),
        }
    }
}

/// Count gaps by reason for summary reporting
pub fn count_by_reason(gaps: &[ClassificationGap]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for gap in gaps {
        *counts.entry(gap.reason.as_str()).or_insert(0) += 1;
    }
    counts
}
