//! Market regime classification across symbols.
//!
//! Reads the last completed candle (the second to last of the series) and
//! ranks symbols by `ADX + 100 · bandwidth%`.

use serde::Serialize;

use common::Candle;

use crate::error::{Error, Result};
use crate::indicators::{AdxIndicator, AdxMethod, BollingerIndicator, StochasticIndicator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// ADX above the trend threshold.
    Trending,
    /// Bands too narrow to trade.
    Dormant,
    Ranging,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::Trending => write!(f, "TRENDING"),
            Regime::Dormant => write!(f, "DORMANT"),
            Regime::Ranging => write!(f, "RANGING"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegimeConfig {
    pub adx_period: usize,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    pub stochastic_window: usize,
    pub trending_adx: f64,
    /// Bandwidth, in percent of the mean, under which a market is dormant.
    pub dormant_bandwidth_pct: f64,
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("adx_period", self.adx_period, 2),
            ("bollinger_window", self.bollinger_window, 2),
            ("stochastic_window", self.stochastic_window, 1),
        ];
        for (name, value, min) in windows {
            if value < min {
                return Err(Error::InvalidConfig(format!("regime {name} must be >= {min}, got {value}")));
            }
        }
        if !(self.bollinger_k.is_finite() && self.bollinger_k > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "regime bollinger_k must be positive, got {}",
                self.bollinger_k
            )));
        }
        Ok(())
    }
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            adx_period: 14,
            bollinger_window: 20,
            bollinger_k: 2.0,
            stochastic_window: 14,
            trending_adx: 25.0,
            dormant_bandwidth_pct: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeReading {
    pub symbol: String,
    pub close: f64,
    pub adx: f64,
    pub bandwidth_pct: f64,
    pub stoch_k: Option<f64>,
    pub regime: Regime,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RegimeScanner {
    config: RegimeConfig,
}

impl RegimeScanner {
    pub fn new(config: RegimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn classify(&self, adx: f64, bandwidth_pct: f64) -> Regime {
        if adx > self.config.trending_adx {
            Regime::Trending
        } else if bandwidth_pct < self.config.dormant_bandwidth_pct {
            Regime::Dormant
        } else {
            Regime::Ranging
        }
    }

    /// `None` when the series is too short for ADX or bandwidth on the last
    /// completed candle.
    pub fn analyze(&self, symbol: &str, candles: &[Candle]) -> Option<RegimeReading> {
        let at = candles.len().checked_sub(2)?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let adx = AdxIndicator::new(self.config.adx_period, AdxMethod::SingleCandle).compute(candles)[at]?;
        let bands = BollingerIndicator::new(self.config.bollinger_window, self.config.bollinger_k, None)
            .compute(&closes);
        let bandwidth_pct = bands.bandwidth[at]? * 100.0;
        let stoch_k = StochasticIndicator::new(self.config.stochastic_window).compute(candles)[at];

        Some(RegimeReading {
            symbol: symbol.to_string(),
            close: closes[at],
            adx,
            bandwidth_pct,
            stoch_k,
            regime: self.classify(adx, bandwidth_pct),
            score: adx + bandwidth_pct * 100.0,
        })
    }
}

/// Highest-scoring reading; the first one wins ties.
pub fn best_opportunity(readings: &[RegimeReading]) -> Option<&RegimeReading> {
    readings.iter().fold(None, |best: Option<&RegimeReading>, r| match best {
        Some(b) if b.score >= r.score => Some(b),
        _ => Some(r),
    })
}
