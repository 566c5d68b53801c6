use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use options_tax::config::BrokerChoice;

pub mod formatters;

#[derive(Parser)]
#[command(name = "options-tax")]
#[command(
    version,
    about = "German tax report (Anlage KAP) for IBKR and TastyTrade options statements"
)]
#[command(
    long_about = "Classify options trades from an IBKR activity statement or a TastyTrade gain/loss export into Termingeschäfte and Stillhaltergeschäfte, convert every amount to EUR at the ECB rate of its reference date, and compute Zeile 21 and Zeile 24 of Anlage KAP."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a statement and compute Zeile 21 / Zeile 24
    Report {
        /// Path to the IBKR or TastyTrade CSV export
        file: PathBuf,

        /// Statement format (default: config file, then auto-detection)
        #[arg(short, long, value_enum)]
        broker: Option<BrokerChoice>,

        /// ECB eurofxref-hist.csv to take USD/EUR rates from
        #[arg(short, long)]
        rates: Option<PathBuf>,

        /// Only list rows that contribute to a tax bucket
        #[arg(long)]
        taxable_only: bool,
    },

    /// Show the USD -> EUR factor applied to amounts dated DATE
    Rate {
        /// Date in YYYY-MM-DD format
        date: NaiveDate,

        /// ECB eurofxref-hist.csv to take USD/EUR rates from
        #[arg(short, long)]
        rates: Option<PathBuf>,
    },

    /// Print the detected broker format of a statement
    Detect {
        /// Path to the CSV export
        file: PathBuf,
    },
}
