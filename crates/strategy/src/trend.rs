use serde::{Deserialize, Serialize};

use common::{Candle, Direction};

use crate::indicators::ema;

/// Macro trend read from higher-timeframe candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendBias {
    Up,
    Down,
    #[default]
    Neutral,
}

/// How a tactical signal must relate to the macro trend to be honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Confluence {
    /// Trend context is not consulted.
    #[default]
    Ignore,
    /// The bias must equal the signal direction; a neutral bias vetoes.
    Agree,
    /// Only the opposite bias vetoes.
    NotContradict,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrendContext {
    pub bias: TrendBias,
    pub close: Option<f64>,
    pub ema: Option<f64>,
}

impl TrendContext {
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Last close against an EMA of `span` over the same candles:
    /// above ⇒ `Up`, otherwise `Down`. No candles ⇒ `Neutral`.
    pub fn from_candles(candles: &[Candle], span: usize) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let (Some(&close), Some(&average)) = (closes.last(), ema(&closes, span).last()) else {
            return Self::neutral();
        };
        let bias = if close > average { TrendBias::Up } else { TrendBias::Down };
        Self {
            bias,
            close: Some(close),
            ema: Some(average),
        }
    }

    pub fn permits(&self, direction: Direction, policy: Confluence) -> bool {
        let aligned = matches!(
            (self.bias, direction),
            (TrendBias::Up, Direction::Up) | (TrendBias::Down, Direction::Down)
        );
        match policy {
            Confluence::Ignore => true,
            Confluence::Agree => aligned,
            Confluence::NotContradict => aligned || self.bias == TrendBias::Neutral,
        }
    }
}

/// Higher-timeframe settings attached to a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    pub timeframe: common::Timeframe,
    pub span: usize,
    #[serde(default = "default_trend_limit")]
    pub limit: usize,
}

fn default_trend_limit() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    #[test]
    fn rising_series_has_up_bias() {
        let candles = make_candles(&(0..40).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let ctx = TrendContext::from_candles(&candles, 20);
        assert_eq!(ctx.bias, TrendBias::Up);
        assert!(ctx.close.unwrap() > ctx.ema.unwrap());
    }

    #[test]
    fn falling_series_has_down_bias() {
        let candles = make_candles(&(0..40).map(|i| 200.0 - i as f64).collect::<Vec<_>>());
        assert_eq!(TrendContext::from_candles(&candles, 20).bias, TrendBias::Down);
    }

    #[test]
    fn empty_candles_are_neutral() {
        assert_eq!(TrendContext::from_candles(&[], 20).bias, TrendBias::Neutral);
    }

    #[test]
    fn confluence_policies() {
        let up = TrendContext { bias: TrendBias::Up, ..TrendContext::default() };
        let neutral = TrendContext::neutral();

        assert!(up.permits(Direction::Up, Confluence::Agree));
        assert!(!up.permits(Direction::Down, Confluence::Agree));
        assert!(!up.permits(Direction::Down, Confluence::NotContradict));
        assert!(up.permits(Direction::Down, Confluence::Ignore));

        assert!(!neutral.permits(Direction::Up, Confluence::Agree));
        assert!(neutral.permits(Direction::Up, Confluence::NotContradict));
    }
}
