use std::time::Duration;

use crate::{Error, Result};

const DEFAULT_BINANCE_URL: &str = "https://api.binance.com";
const DEFAULT_JOURNAL_PATH: &str = "trade_history.csv";

/// Runtime configuration loaded from environment variables at startup.
/// Every variable is optional; malformed values are reported as
/// `Error::Config` instead of being silently replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the Binance REST API.
    pub binance_base_url: String,

    /// Optional TOML strategy file (see `strategy::StrategyFileConfig`).
    pub strategy_config_path: Option<String>,

    /// CSV trade log appended on every settlement.
    pub journal_path: String,

    /// Live loop: delay between ticks.
    pub poll_interval: Duration,
    /// Live loop: delay after a failed market-data fetch.
    pub retry_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binance_base_url: DEFAULT_BINANCE_URL.to_string(),
            strategy_config_path: None,
            journal_path: DEFAULT_JOURNAL_PATH.to_string(),
            poll_interval: Duration::from_secs(30),
            retry_delay: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        Ok(Config {
            binance_base_url: lookup("SENTINEL_BINANCE_URL")
                .unwrap_or(defaults.binance_base_url),
            strategy_config_path: lookup("SENTINEL_STRATEGY_FILE"),
            journal_path: lookup("SENTINEL_JOURNAL_PATH").unwrap_or(defaults.journal_path),
            poll_interval: seconds(&lookup, "SENTINEL_POLL_SECS")?
                .unwrap_or(defaults.poll_interval),
            retry_delay: seconds(&lookup, "SENTINEL_RETRY_SECS")?
                .unwrap_or(defaults.retry_delay),
        })
    }
}

fn seconds<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| Error::Config(format!("{key} must be a whole number of seconds, got '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("SENTINEL_POLL_SECS", "5"),
            ("SENTINEL_JOURNAL_PATH", "/tmp/log.csv"),
            ("SENTINEL_STRATEGY_FILE", "strategies.toml"),
        ]))
        .unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.journal_path, "/tmp/log.csv");
        assert_eq!(cfg.strategy_config_path.as_deref(), Some("strategies.toml"));
    }

    #[test]
    fn malformed_seconds_is_a_config_error() {
        let err = Config::from_lookup(lookup_from(&[("SENTINEL_RETRY_SECS", "ten")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
