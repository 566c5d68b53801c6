//! Output formatting module for CLI display
//!
//! Keeps presentation apart from the tax pipeline: everything here takes a
//! finished `TaxReport` (or a rate lookup) and renders it as a terminal table
//! or as JSON.

use chrono::NaiveDate;
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use options_tax::currency::Currency;
use options_tax::models::{Broker, ConvertedTransaction, LongShort};
use options_tax::tax::diagnostics::count_by_reason;
use options_tax::tax::{legend, ReportLine, TaxReport, DISCLAIMER};
use options_tax::utils::{
    format_decimal_de, format_eur, format_units, format_usd, CurrencySymbol,
};

/// Format a report for JSON output (amounts as exact decimal strings)
pub fn format_report_json(report: &TaxReport) -> String {
    #[derive(Serialize)]
    struct JsonReport<'a> {
        #[serde(flatten)]
        report: &'a TaxReport,
        unclassified: usize,
        disclaimer: &'static str,
    }

    let json_report = JsonReport {
        report,
        unclassified: report.unclassified_count(),
        disclaimer: DISCLAIMER,
    };

    serde_json::to_string_pretty(&json_report)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

#[derive(Tabled)]
struct BucketRow {
    #[tabled(rename = "Zeile")]
    row: usize,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Datum")]
    date: String,
    #[tabled(rename = "Menge")]
    quantity: String,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Typ")]
    trade_type: String,
    #[tabled(rename = "Spalte")]
    bucket: String,
    #[tabled(rename = "Betrag")]
    amount: String,
    #[tabled(rename = "Stichtag")]
    reference_date: String,
    #[tabled(rename = "EUR")]
    eur: String,
}

/// Format a report for terminal table output
pub fn format_report_table(report: &TaxReport, taxable_only: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n{} Steuerliche Zuordnung der Transaktionen ({})\n\n",
        "📊".cyan().bold(),
        report.broker
    ));

    for line in legend(report.broker) {
        output.push_str(&format!("  {}\n", line.dimmed()));
    }
    output.push('\n');

    let rows: Vec<BucketRow> = report
        .transactions
        .iter()
        .flat_map(|tx| bucket_rows(report.broker, tx, taxable_only))
        .collect();

    if rows.is_empty() {
        output.push_str("Keine Optionsgeschäfte gefunden.\n");
    } else {
        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(3..4), Alignment::right());
        table.modify(Columns::new(7..8), Alignment::right());
        table.modify(Columns::new(9..10), Alignment::right());
        output.push_str(&format!("{}\n", table));
    }

    if report.excluded_rows > 0 {
        output.push_str(&format!(
            "{} {} Zeilen ohne Optionsbezug ignoriert\n",
            "ℹ".blue().bold(),
            report.excluded_rows
        ));
    }

    output.push_str(&format_gaps(report));

    output.push('\n');
    output.push_str(&format_line(&report.summary.line21, CurrencySymbol::Eur));
    output.push_str(&format_line(&report.summary.line24, CurrencySymbol::Eur));
    output.push_str(&format_line(&report.summary.control_total, CurrencySymbol::Usd));

    output.push_str(&format!("\n{}\n", DISCLAIMER.yellow()));
    output
}

fn bucket_rows(broker: Broker, tx: &ConvertedTransaction, taxable_only: bool) -> Vec<BucketRow> {
    let transaction = tx.transaction();
    let date = match (broker, transaction.executed_at) {
        (Broker::Ibkr, Some(at)) => at.format("%Y-%m-%d %H:%M").to_string(),
        _ => format!("{} → {}", transaction.open_date, transaction.close_date),
    };
    let code = match (&transaction.code, transaction.long_short) {
        (Some(code), _) => code.clone(),
        (None, Some(side)) => side.as_str().to_string(),
        (None, None) => String::new(),
    };
    let trade_type = match (&tx.classified.gap, tx.classified.trade_type, transaction.long_short)
    {
        (Some(_), _, _) => "?".to_string(),
        (None, Some(trade_type), _) => trade_type.as_str().to_string(),
        (None, None, Some(LongShort::Long)) => "Long".to_string(),
        (None, None, Some(LongShort::Short)) => "Short".to_string(),
        (None, None, None) => String::new(),
    };

    let base = |bucket: String, amount: String, reference_date: String, eur: String| BucketRow {
        row: transaction.row,
        symbol: transaction.symbol.clone(),
        date: date.clone(),
        quantity: transaction.quantity.normalize().to_string(),
        code: code.clone(),
        trade_type: trade_type.clone(),
        bucket,
        amount,
        reference_date,
        eur,
    };

    if tx.converted.is_empty() {
        if taxable_only {
            return Vec::new();
        }
        return vec![base("-".to_string(), "-".to_string(), "-".to_string(), "-".to_string())];
    }

    tx.converted
        .iter()
        .map(|amount| {
            base(
                amount.bucket.label().to_string(),
                format_source_amount(amount.amount, transaction.currency),
                amount.reference_date.to_string(),
                colored_amount(amount.amount_eur),
            )
        })
        .collect()
}

fn format_source_amount(value: Decimal, currency: Currency) -> String {
    match currency {
        Currency::Usd => format_usd(value),
        Currency::Eur => format_eur(value),
    }
}

fn colored_amount(value: Decimal) -> String {
    let text = format_decimal_de(value);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn format_gaps(report: &TaxReport) -> String {
    if report.gaps.is_empty() {
        return String::new();
    }

    let mut output = format!(
        "\n{} {} Transaktionen konnten nicht zugeordnet werden und fehlen in den Summen:\n",
        "⚠".yellow().bold(),
        report.unclassified_count()
    );
    for gap in &report.gaps {
        output.push_str(&format!(
            "  Zeile {:>4}  {:<24} Menge {:>6}  Code {:<6} {}\n",
            gap.row,
            gap.symbol,
            gap.quantity.normalize(),
            gap.code.as_deref().unwrap_or("-"),
            gap.reason
        ));
    }
    for (reason, count) in count_by_reason(&report.gaps) {
        output.push_str(&format!("  {:>3} x {}\n", count, reason.dimmed()));
    }
    output
}

fn format_line(line: &ReportLine, symbol: CurrencySymbol) -> String {
    format!(
        "{:<66} {:>14}\n  {}\n",
        line.label.bold(),
        format_units(line.value, symbol).bold(),
        line.description.dimmed()
    )
}

/// Rate lookup result shown by the `rate` command
#[derive(Debug, Serialize)]
pub struct RateLookup {
    pub date: NaiveDate,
    /// ECB fixing actually used (same day or the closest earlier one)
    pub rate_date: NaiveDate,
    /// USD per 1 EUR as published
    pub usd_per_eur: Decimal,
    /// Multiplier turning USD into EUR
    pub usd_to_eur: Decimal,
}

pub fn format_rate_json(lookup: &RateLookup) -> String {
    serde_json::to_string_pretty(lookup)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

pub fn format_rate(lookup: &RateLookup) -> String {
    let mut output = format!(
        "{}: 1 USD = {} EUR",
        lookup.date.to_string().bold(),
        format_rate_value(lookup.usd_to_eur)
    );
    output.push_str(&format!(
        "  (EZB {}: {} USD/EUR)",
        lookup.rate_date,
        format_rate_value(lookup.usd_per_eur)
    ));
    if lookup.rate_date != lookup.date {
        output.push_str(&format!(
            "\n{} kein Kurs am {}, Vortageskurs verwendet",
            "ℹ".blue().bold(),
            lookup.date
        ));
    }
    output.push('\n');
    output
}

fn format_rate_value(value: Decimal) -> String {
    options_tax::utils::format_amount_with_width(value, 6, 0, CurrencySymbol::None)
}
