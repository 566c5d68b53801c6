mod cli;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::formatters::{
    format_rate, format_rate_json, format_report_json, format_report_table, RateLookup,
};
use cli::{Cli, Commands};
use options_tax::config::{BrokerChoice, Config};
use options_tax::currency::EcbRates;
use options_tax::importers::{decode_statement, detect_broker};
use options_tax::tax::process_statement_for;

fn main() -> Result<()> {
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let config = Config::load()?;

    match cli.command {
        Commands::Report {
            file,
            broker,
            rates,
            taxable_only,
        } => handle_report(
            &config,
            &file,
            config.broker_choice(broker),
            rates,
            taxable_only,
            cli.json,
        ),
        Commands::Rate { date, rates } => handle_rate(&config, date, rates, cli.json),
        Commands::Detect { file } => handle_detect(&file, cli.json),
    }
}

fn read_statement(file: &Path) -> Result<Vec<u8>> {
    fs::read(file).with_context(|| format!("Failed to read statement {:?}", file))
}

fn load_rates(config: &Config, flag: Option<PathBuf>) -> Result<EcbRates> {
    let path = config.rates_path(flag.as_deref())?;
    EcbRates::from_path(&path).with_context(|| {
        format!(
            "Failed to load ECB rates from {:?} (download eurofxref-hist.zip from the ECB \
             and pass --rates or set rates_file in the config)",
            path
        )
    })
}

fn handle_report(
    config: &Config,
    file: &Path,
    choice: BrokerChoice,
    rates: Option<PathBuf>,
    taxable_only: bool,
    json: bool,
) -> Result<()> {
    let input = read_statement(file)?;

    let broker = match choice.broker() {
        Some(broker) => broker,
        None => detect_broker(&decode_statement(&input))
            .with_context(|| format!("Could not detect statement format of {:?}", file))?,
    };
    info!("Processing {} statement: {:?}", broker, file);

    let rates = load_rates(config, rates)?;
    let report = process_statement_for(broker, &input, &rates)
        .with_context(|| format!("Failed to process {} statement {:?}", broker, file))?;

    if json {
        println!("{}", format_report_json(&report));
    } else {
        print!("{}", format_report_table(&report, taxable_only));
    }
    Ok(())
}

fn handle_rate(
    config: &Config,
    date: NaiveDate,
    rates: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let rates = load_rates(config, rates)?;
    let (rate_date, usd_to_eur) = rates.usd_to_eur_factor(date)?;
    let usd_per_eur = rates
        .quote_on(date)
        .map(|(_, quote)| quote)
        .with_context(|| format!("No ECB quote on or before {}", date))?;

    let lookup = RateLookup {
        date,
        rate_date,
        usd_per_eur,
        usd_to_eur,
    };
    if json {
        println!("{}", format_rate_json(&lookup));
    } else {
        print!("{}", format_rate(&lookup));
    }
    Ok(())
}

fn handle_detect(file: &Path, json: bool) -> Result<()> {
    let input = read_statement(file)?;
    let broker = detect_broker(&decode_statement(&input))
        .with_context(|| format!("Could not detect statement format of {:?}", file))?;

    if json {
        println!("{}", serde_json::json!({ "broker": broker }));
    } else {
        println!("{}", broker);
    }
    Ok(())
}
