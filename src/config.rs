//! Configuration for the command-line front end
//!
//! Resolution order, highest first:
//! 1. command-line flags
//! 2. `OPTIONS_TAX_RATES` environment variable (rates file only)
//! 3. `<config_home>/options-tax/config.toml`
//! 4. defaults (`<cache_home>/options-tax/eurofxref-hist.csv`, broker auto-detection)

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::Broker;

pub const RATES_ENV: &str = "OPTIONS_TAX_RATES";
const APP_DIR: &str = "options-tax";
const CONFIG_FILENAME: &str = "config.toml";
const RATES_FILENAME: &str = "eurofxref-hist.csv";

/// Broker selection: a fixed format or detection from the file content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BrokerChoice {
    Ibkr,
    #[value(alias = "tastytrade")]
    #[serde(alias = "tastytrade")]
    Tasty,
    Auto,
}

impl BrokerChoice {
    /// The fixed broker, or None when the format should be detected
    pub fn broker(&self) -> Option<Broker> {
        match self {
            BrokerChoice::Ibkr => Some(Broker::Ibkr),
            BrokerChoice::Tasty => Some(Broker::TastyTrade),
            BrokerChoice::Auto => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// ECB `eurofxref-hist.csv`, refreshed outside of this tool
    pub rates_file: Option<PathBuf>,
    pub broker: Option<BrokerChoice>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join(CONFIG_FILENAME);
        let config = if path.exists() {
            info!("Loading config: {:?}", path);
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            Self::from_toml_str(&text)
                .with_context(|| format!("Invalid config file {:?}", path))?
        } else {
            debug!("No config file at {:?}, using defaults", path);
            Self::default()
        };

        Ok(config.with_env_rates(std::env::var_os(RATES_ENV)))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse TOML config")
    }

    /// Override the rates file from the environment variable value
    pub fn with_env_rates(mut self, value: Option<OsString>) -> Self {
        if let Some(path) = value.filter(|v| !v.is_empty()) {
            self.rates_file = Some(PathBuf::from(path));
        }
        self
    }

    /// Rates file: flag, then config/env, then the cache default
    pub fn rates_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = &self.rates_file {
            return Ok(path.clone());
        }
        Ok(cache_dir()?.join(RATES_FILENAME))
    }

    pub fn broker_choice(&self, flag: Option<BrokerChoice>) -> BrokerChoice {
        flag.or(self.broker).unwrap_or(BrokerChoice::Auto)
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let config_home = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::config_home)
        .ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(config_home.join(APP_DIR))
}

pub fn cache_dir() -> Result<PathBuf> {
    let cache_home = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::cache_home)
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?;
    Ok(cache_home.join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_file() {
        let config = Config::from_toml_str(
            r#"
            rates_file = "/data/ecb/eurofxref-hist.csv"
            broker = "tastytrade"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.rates_file,
            Some(PathBuf::from("/data/ecb/eurofxref-hist.csv"))
        );
        assert_eq!(config.broker, Some(BrokerChoice::Tasty));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Config::from_toml_str("rate_file = \"x.csv\"").is_err());
    }

    #[test]
    fn test_flag_beats_env_beats_file() {
        let config = Config::from_toml_str("rates_file = \"file.csv\"")
            .unwrap()
            .with_env_rates(Some(OsString::from("env.csv")));

        assert_eq!(config.rates_path(None).unwrap(), PathBuf::from("env.csv"));
        assert_eq!(
            config.rates_path(Some(Path::new("flag.csv"))).unwrap(),
            PathBuf::from("flag.csv")
        );
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let config = Config::default().with_env_rates(Some(OsString::new()));
        assert_eq!(config.rates_file, None);
    }

    #[test]
    fn test_broker_choice_defaults_to_auto() {
        let config = Config::default();
        assert_eq!(config.broker_choice(None), BrokerChoice::Auto);
        assert_eq!(config.broker_choice(Some(BrokerChoice::Ibkr)), BrokerChoice::Ibkr);
        assert_eq!(BrokerChoice::Tasty.broker(), Some(Broker::TastyTrade));
        assert_eq!(BrokerChoice::Auto.broker(), None);
    }
}
