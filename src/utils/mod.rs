//! Utility functions for formatting amounts
//!
//! German notation is used throughout the report, matching the tax form:
//! thousands separator `.`, decimal separator `,`, currency sign after the number.

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// " €" suffix
    Eur,
    /// " $" suffix
    Usd,
    /// No currency symbol (table cells)
    None,
}

impl CurrencySymbol {
    fn suffix(&self) -> &'static str {
        match self {
            CurrencySymbol::Eur => " €",
            CurrencySymbol::Usd => " $",
            CurrencySymbol::None => "",
        }
    }
}

/// Core formatting function with full control over output.
///
/// # Arguments
/// * `value` - The decimal value to format
/// * `decimals` - Fractional digits shown (rounded half away from zero)
/// * `width` - Minimum width for padding (0 for no padding, right-aligned)
/// * `symbol` - Currency suffix
///
/// # Examples
/// ```
/// use options_tax::utils::{format_amount_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_amount_with_width(dec!(1234.56), 2, 0, CurrencySymbol::Eur),
///     "1.234,56 €"
/// );
///
/// assert_eq!(
///     format_amount_with_width(dec!(1234), 2, 12, CurrencySymbol::None),
///     "    1.234,00"
/// );
/// ```
pub fn format_amount_with_width(
    value: Decimal,
    decimals: u32,
    width: usize,
    symbol: CurrencySymbol,
) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let is_negative = rounded < Decimal::ZERO;

    let formatted = format!("{:.*}", decimals as usize, rounded.abs());
    let (integer_part, decimal_part) = match formatted.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (formatted.as_str(), None),
    };

    // Add thousands separators (.) to integer part
    let digits: Vec<char> = integer_part.chars().collect();
    let mut with_separators = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            with_separators.push('.');
        }
        with_separators.push(*c);
    }

    let sign = if is_negative { "-" } else { "" };
    let result = match decimal_part {
        Some(frac) => format!("{}{},{}{}", sign, with_separators, frac, symbol.suffix()),
        None => format!("{}{}{}", sign, with_separators, symbol.suffix()),
    };

    // Apply width padding (right-align)
    if width > 0 && result.chars().count() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

// ============ Convenience functions ============

/// Format as Euro: "1.234,56 €"
///
/// # Examples
/// ```
/// use options_tax::utils::format_eur;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_eur(dec!(-243)), "-243,00 €");
/// ```
pub fn format_eur(value: Decimal) -> String {
    format_amount_with_width(value, 2, 0, CurrencySymbol::Eur)
}

/// Format as US dollar: "1.234,56 $"
pub fn format_usd(value: Decimal) -> String {
    format_amount_with_width(value, 2, 0, CurrencySymbol::Usd)
}

/// Format a whole-unit tax form total: "1.234 €"
pub fn format_units(value: Decimal, symbol: CurrencySymbol) -> String {
    format_amount_with_width(value, 0, 0, symbol)
}

/// Format number only (no symbol): "1.234,56"
pub fn format_decimal_de(value: Decimal) -> String {
    format_amount_with_width(value, 2, 0, CurrencySymbol::None)
}
