//! Options Tax - German tax reporting for options trading statements
//!
//! This library classifies options transactions from Interactive Brokers and
//! TastyTrade exports into Termingeschäfte and Stillhaltergeschäfte, converts
//! every amount to EUR at the rate of its reference date, and computes the
//! Anlage KAP totals (Zeile 21, Zeile 24).

pub mod config;
pub mod currency;
pub mod error;
pub mod importers;
pub mod models;
pub mod tax;
pub mod utils;
