use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::diagnostics::ClassificationGap;
use crate::models::{
    BucketAmount, ClassifiedTransaction, LongShort, TaxBucket, TradeType, Transaction,
};

/// Derive the IBKR trade type from quantity sign and the `Code` column.
///
/// | quantity | code | type |
/// |----------|------|------|
/// | > 0      | O    | BTO  |
/// | < 0      | C    | STC  |
/// | < 0      | O    | STO  |
/// | > 0      | C    | BTC  |
///
/// A code carrying both flags resolves to the closing rule for positive
/// quantities (BTC) and the opening rule for negative ones (STO).
pub fn ibkr_trade_type(quantity: Decimal, code: &str) -> Option<TradeType> {
    let opens = code.contains('O');
    let closes = code.contains('C');

    if quantity > Decimal::ZERO {
        if closes {
            Some(TradeType::Btc)
        } else if opens {
            Some(TradeType::Bto)
        } else {
            None
        }
    } else if quantity < Decimal::ZERO {
        if opens {
            Some(TradeType::Sto)
        } else if closes {
            Some(TradeType::Stc)
        } else {
            None
        }
    } else {
        None
    }
}

/// Assign trade type and bucket amounts to an IBKR row.
///
/// - STC: Termingeschäfte = realized P&L
/// - STO: Stillhalter = -basis (premium received)
/// - BTC: Stillhalter = realized P&L - basis
/// - BTO: no taxable event
pub fn classify_ibkr(transaction: Transaction) -> ClassifiedTransaction {
    let code = transaction.code.clone().unwrap_or_default();
    let Some(trade_type) = ibkr_trade_type(transaction.quantity, &code) else {
        let reason = if transaction.quantity.is_zero() {
            "quantity is zero"
        } else {
            "code has neither O nor C flag"
        };
        return unclassified(transaction, reason);
    };

    let date = transaction.close_date;
    let amounts = match trade_type {
        TradeType::Bto => Vec::new(),
        TradeType::Stc => vec![BucketAmount {
            bucket: TaxBucket::Termingeschaefte,
            amount: transaction.realized_pnl,
            reference_date: date,
        }],
        TradeType::Sto | TradeType::Btc => {
            let Some(basis) = transaction.basis else {
                return unclassified(transaction, "missing basis");
            };
            let amount = if trade_type == TradeType::Sto {
                -basis
            } else {
                transaction.realized_pnl - basis
            };
            vec![BucketAmount {
                bucket: TaxBucket::Stillhalter,
                amount,
                reference_date: date,
            }]
        }
    };

    debug!(
        "row {}: {} qty={} code={} -> {}",
        transaction.row,
        transaction.symbol,
        transaction.quantity,
        code,
        trade_type.as_str()
    );

    ClassifiedTransaction {
        transaction,
        trade_type: Some(trade_type),
        amounts,
        gap: None,
    }
}

/// Assign bucket amounts to a TastyTrade row.
///
/// Long positions report their gain/loss as Termingeschäfte (close date).
/// Short positions split into the premium received (open date) and the
/// closing cost (close date).
pub fn classify_tasty(transaction: Transaction) -> ClassifiedTransaction {
    let side = transaction.long_short;
    let amounts = match side {
        Some(LongShort::Long) => vec![BucketAmount {
            bucket: TaxBucket::Termingeschaefte,
            amount: transaction.realized_pnl,
            reference_date: transaction.close_date,
        }],
        Some(LongShort::Short) => {
            let (Some(proceeds), Some(cost)) = (transaction.proceeds, transaction.cost) else {
                return unclassified(transaction, "missing proceeds or cost");
            };
            vec![
                BucketAmount {
                    bucket: TaxBucket::StillhalterOpen,
                    amount: proceeds,
                    reference_date: transaction.open_date,
                },
                BucketAmount {
                    bucket: TaxBucket::StillhalterClose,
                    amount: -cost,
                    reference_date: transaction.close_date,
                },
            ]
        }
        None => return unclassified(transaction, "missing long/short indicator"),
    };

    ClassifiedTransaction {
        transaction,
        trade_type: None,
        amounts,
        gap: None,
    }
}

fn unclassified(transaction: Transaction, reason: &str) -> ClassifiedTransaction {
    warn!(
        "row {}: {} left unclassified ({})",
        transaction.row, transaction.symbol, reason
    );
    let gap = ClassificationGap::new(&transaction, reason);
    ClassifiedTransaction {
        transaction,
        trade_type: None,
        amounts: Vec::new(),
        gap: Some(gap),
    }
}
