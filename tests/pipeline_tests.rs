// Statement-to-totals tests running the full library pipeline

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cell::RefCell;

use options_tax::currency::{Currency, EcbRates, RateOracle};
use options_tax::error::{ParseError, Result, TaxError};
use options_tax::models::{Broker, TaxBucket, TradeType};
use options_tax::tax::process_statement_for;

const IBKR_FIXTURE: &str = "tests/data/ibkr_statement.csv";
const TASTY_FIXTURE: &str = "tests/data/tasty_statement.csv";
const RATES_FIXTURE: &str = "tests/data/eurofxref-hist.csv";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fixture(path: &str) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

fn ecb_rates() -> EcbRates {
    EcbRates::from_path(RATES_FIXTURE).unwrap()
}

/// Multiplies every amount by a constant factor
struct FixedRate(Decimal);

impl RateOracle for FixedRate {
    fn convert(&self, amount: Decimal, _from: Currency, _to: Currency, _as_of: NaiveDate) -> Result<Decimal> {
        Ok(amount * self.0)
    }
}

/// Returns the amount unchanged and records which dates were asked for
#[derive(Default)]
struct RecordingOracle {
    calls: RefCell<Vec<(Decimal, NaiveDate)>>,
}

impl RateOracle for RecordingOracle {
    fn convert(&self, amount: Decimal, _from: Currency, _to: Currency, as_of: NaiveDate) -> Result<Decimal> {
        self.calls.borrow_mut().push((amount, as_of));
        Ok(amount)
    }
}

const IBKR_HEADER: &str = "Transaktionen,Header,DataDiscriminator,Vermögenswertkategorie,Währung,Symbol,Datum/Zeit,Menge,Basis,Realisierter G&V,Code";
const TASTY_HEADER: &str = "TAX_YEAR,SYMBOL,SEC_TYPE,SEC_SUBTYPE,OPEN_DATE,CLOSE_DATE,CLOSE_EVENT,QUANTITY,LONG_SHORT_IND,NO_WS_COST,NO_WS_PROCEEDS,NO_WS_GAINLOSS";

fn csv(header: &str, rows: &[&str]) -> Vec<u8> {
    let mut text = format!("{}\n", header);
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text.into_bytes()
}

#[test]
fn test_ibkr_fixture_against_ecb_rates() {
    let report = process_statement_for(Broker::Ibkr, &fixture(IBKR_FIXTURE), &ecb_rates()).unwrap();

    assert_eq!(report.transactions.len(), 5);
    assert_eq!(report.excluded_rows, 1);
    assert!(report.gaps.is_empty());

    let trade_types: Vec<_> = report
        .transactions
        .iter()
        .map(|tx| tx.classified.trade_type)
        .collect();
    assert_eq!(
        trade_types,
        vec![
            Some(TradeType::Sto),
            Some(TradeType::Btc),
            Some(TradeType::Bto),
            Some(TradeType::Stc),
            Some(TradeType::Stc),
        ]
    );

    // 148.95 USD / 1.25 premium received, BTC -31.05 USD at 1.0
    assert_eq!(report.transactions[0].amount_eur(TaxBucket::Stillhalter), Some(dec!(119.16)));
    assert_eq!(report.transactions[1].amount_eur(TaxBucket::Stillhalter), Some(dec!(-31.05)));
    assert!(report.transactions[2].converted.is_empty());
    assert_eq!(report.transactions[3].amount_eur(TaxBucket::Termingeschaefte), Some(dec!(187.5)));
    // 2023-03-20 has no fixing in the table, Friday's 1.6 applies
    assert_eq!(report.transactions[4].amount_eur(TaxBucket::Termingeschaefte), Some(dec!(-50)));
    assert_eq!(report.transactions[4].converted[0].reference_date, date(2023, 3, 20));

    assert_eq!(report.summary.line21.exact, dec!(275.61));
    assert_eq!(report.summary.line21.value, dec!(275));
    assert_eq!(report.summary.line24.value, dec!(50));
    assert_eq!(report.summary.control_total.value, dec!(337));
    assert_eq!(report.summary.control_total.currency, "USD");
}

#[test]
fn test_tasty_fixture_against_ecb_rates() {
    let report =
        process_statement_for(Broker::TastyTrade, &fixture(TASTY_FIXTURE), &ecb_rates()).unwrap();

    assert_eq!(report.transactions.len(), 3);
    assert_eq!(report.excluded_rows, 1);

    let short = &report.transactions[0];
    assert_eq!(short.amount_eur(TaxBucket::StillhalterOpen), Some(dec!(80)));
    assert_eq!(short.amount_eur(TaxBucket::StillhalterClose), Some(dec!(-25)));
    assert_eq!(short.amount_eur(TaxBucket::Termingeschaefte), None);

    // Zeile 21 = 80 - 25 + 50, Zeile 24 = 120
    assert_eq!(report.summary.line21.value, dec!(105));
    assert_eq!(report.summary.line24.value, dec!(120));
    assert_eq!(report.summary.control_total.value, dec!(15));
}

#[test]
fn test_short_option_round_trip_at_fixed_rate() {
    let input = csv(
        IBKR_HEADER,
        &[
            "Transaktionen,Data,Order,Aktien- und Indexoptionen,USD,SPY,\"2023-01-05, 15:00:00\",-1,150.00,0,O",
            "Transaktionen,Data,Order,Aktien- und Indexoptionen,USD,SPY,\"2023-01-10, 16:00:00\",1,150.00,30.00,C",
        ],
    );
    let report = process_statement_for(Broker::Ibkr, &input, &FixedRate(dec!(0.90))).unwrap();

    let stillhalter: Vec<_> = report
        .transactions
        .iter()
        .map(|tx| tx.classified.amount(TaxBucket::Stillhalter))
        .collect();
    assert_eq!(stillhalter, vec![Some(dec!(-150.00)), Some(dec!(-120.00))]);

    assert_eq!(report.summary.line21.exact, dec!(-243.00));
    assert_eq!(report.summary.line21.value, dec!(-243));
    assert_eq!(report.summary.line24.value, dec!(0));
}

#[test]
fn test_termingeschaefte_split_by_sign() {
    let input = csv(
        TASTY_HEADER,
        &[
            "2023,A,Option,Equity Option,2023-01-02,2023-02-01,Sell to Close,1,L,$0,$0,$100.00",
            "2023,B,Option,Equity Option,2023-01-02,2023-02-02,Sell to Close,1,L,$0,$0,-$40.00",
            "2023,C,Option,Equity Option,2023-01-02,2023-02-03,Sell to Close,1,L,$0,$0,$5.00",
            "2023,D,Option,Equity Option,2023-01-02,2023-02-06,Sell to Close,1,L,$0,$0,-$200.00",
        ],
    );
    let report = process_statement_for(Broker::TastyTrade, &input, &FixedRate(Decimal::ONE)).unwrap();

    assert_eq!(report.summary.line21.value, dec!(105));
    assert_eq!(report.summary.line24.value, dec!(240));
    assert!(report.summary.line24.value >= Decimal::ZERO);
}

#[test]
fn test_each_bucket_converted_at_its_reference_date() {
    let input = csv(
        TASTY_HEADER,
        &["2023,SPY,Option,Equity Option,2023-01-03,2023-01-20,Buy to Close,1,S,$40.00,$100.00,$60.00"],
    );
    let oracle = RecordingOracle::default();
    process_statement_for(Broker::TastyTrade, &input, &oracle).unwrap();

    let calls = oracle.calls.into_inner();
    assert_eq!(
        calls,
        vec![(dec!(100.00), date(2023, 1, 3)), (dec!(-40.00), date(2023, 1, 20))]
    );
}

#[test]
fn test_rerun_gives_identical_output() {
    let input = fixture(IBKR_FIXTURE);
    let rates = ecb_rates();

    let first = process_statement_for(Broker::Ibkr, &input, &rates).unwrap();
    let second = process_statement_for(Broker::Ibkr, &input, &rates).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_missing_rate_aborts_instead_of_defaulting() {
    // only March fixings: the January STO cannot be converted
    let rates = EcbRates::from_rates([(date(2023, 3, 17), dec!(1.6))]);
    let err = process_statement_for(Broker::Ibkr, &fixture(IBKR_FIXTURE), &rates).unwrap_err();

    match err {
        TaxError::RateUnavailable { from, to, date: as_of } => {
            assert_eq!(from, Currency::Usd);
            assert_eq!(to, Currency::Eur);
            assert_eq!(as_of, date(2023, 1, 5));
        }
        other => panic!("expected RateUnavailable, got {:?}", other),
    }
}

#[test]
fn test_unclassified_row_reported_not_fatal() {
    let input = csv(
        IBKR_HEADER,
        &[
            "Transaktionen,Data,Order,Aktien- und Indexoptionen,USD,SPY,\"2023-01-05, 15:00:00\",-1,-150.00,0,O",
            "Transaktionen,Data,Order,Aktien- und Indexoptionen,USD,SPY,\"2023-01-06, 15:00:00\",1,0,0,Ep",
        ],
    );
    let report = process_statement_for(Broker::Ibkr, &input, &FixedRate(Decimal::ONE)).unwrap();

    assert_eq!(report.transactions.len(), 2);
    assert_eq!(report.unclassified_count(), 1);
    assert_eq!(report.gaps[0].row, 3);
    assert_eq!(report.summary.line21.value, dec!(150));
}

#[test]
fn test_eur_rows_are_not_converted() {
    let input = csv(
        IBKR_HEADER,
        &[
            "Transaktionen,Data,Order,Aktien- und Indexoptionen,EUR,ODAX 17MAR23 15000 C,\"2023-01-05, 17:30:00\",-1,-500,100,C",
            "Transaktionen,Data,Order,Aktien- und Indexoptionen,USD,SPY 20JAN23 380 P,\"2023-01-05, 15:00:00\",-1,-900,100,C",
        ],
    );
    let report = process_statement_for(Broker::Ibkr, &input, &ecb_rates()).unwrap();

    assert_eq!(report.transactions[0].transaction().currency, Currency::Eur);
    assert_eq!(
        report.transactions[0].amount_eur(TaxBucket::Termingeschaefte),
        Some(dec!(100))
    );
    // 100 USD at 1.25 USD per EUR
    assert_eq!(
        report.transactions[1].amount_eur(TaxBucket::Termingeschaefte),
        Some(dec!(80))
    );
    assert_eq!(report.summary.line21.value, dec!(180));
}

#[test]
fn test_unsupported_currency_aborts_parse() {
    let input = csv(
        IBKR_HEADER,
        &["Transaktionen,Data,Order,Aktien- und Indexoptionen,CHF,OSMI,\"2023-01-05, 17:30:00\",-1,-500,100,C"],
    );
    let err = process_statement_for(Broker::Ibkr, &input, &ecb_rates()).unwrap_err();
    assert!(matches!(
        err,
        TaxError::Parse(ParseError::InvalidField { ref column, .. }) if column == "Währung"
    ));
}

#[test]
fn test_tasty_put_without_option_subtype_is_taxed() {
    let input = csv(
        TASTY_HEADER,
        &[
            "2023,SPY 230120P00380000,OPTION,PUT,2023-01-03,2023-01-20,Expiration,1,S,$0.00,$100.00,$100.00",
            "2023,MSFT,Stock,,2023-01-03,2023-02-10,Sell,10,L,$2300.00,$2600.00,$300.00",
        ],
    );
    let report = process_statement_for(Broker::TastyTrade, &input, &FixedRate(dec!(0.90))).unwrap();

    assert_eq!(report.transactions.len(), 1);
    assert_eq!(report.excluded_rows, 1);
    assert_eq!(
        report.transactions[0].classified.amount(TaxBucket::StillhalterOpen),
        Some(dec!(100.00))
    );
    assert_eq!(report.summary.line21.value, dec!(90));
    assert_eq!(report.summary.line24.value, dec!(0));
}

#[test]
fn test_missing_section_marker() {
    let input = b"Statement,Header,Feldname,Feldwert\nStatement,Data,BrokerName,IBKR\n";
    let err = process_statement_for(Broker::Ibkr, input, &FixedRate(Decimal::ONE)).unwrap_err();
    assert!(matches!(
        err,
        TaxError::Parse(ParseError::MissingSection { .. })
    ));
}

#[test]
fn test_missing_column() {
    let input = csv(
        "TAX_YEAR,SYMBOL,SEC_TYPE,SEC_SUBTYPE,OPEN_DATE,CLOSE_DATE,CLOSE_EVENT,QUANTITY,NO_WS_COST,NO_WS_PROCEEDS,NO_WS_GAINLOSS",
        &["2023,SPY,Option,Equity Option,2023-01-03,2023-01-20,Buy to Close,1,$40.00,$100.00,$60.00"],
    );
    let err = process_statement_for(Broker::TastyTrade, &input, &FixedRate(Decimal::ONE)).unwrap_err();
    match err {
        TaxError::Parse(ParseError::MissingColumn { column }) => assert_eq!(column, "LONG_SHORT_IND"),
        other => panic!("expected MissingColumn, got {:?}", other),
    }
}

#[test]
fn test_windows_1252_export_is_decoded() {
    let text = "Transaktionen,Header,Vermögenswertkategorie,Währung,Symbol,Datum/Zeit,Menge,Basis,Realisierter G&V,Code\n\
                Transaktionen,Data,Aktien- und Indexoptionen,USD,SPY,\"2023-01-05, 15:00:00\",-1,-150.00,0,O\n";
    let (encoded, _, had_errors) = encoding_rs::WINDOWS_1252.encode(text);
    assert!(!had_errors);

    let report = process_statement_for(Broker::Ibkr, &encoded, &FixedRate(Decimal::ONE)).unwrap();
    assert_eq!(report.transactions.len(), 1);
    assert_eq!(report.summary.line21.value, dec!(150));
}
