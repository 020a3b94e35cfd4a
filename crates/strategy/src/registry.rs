use tracing::info;

use common::{DiagnosticConfig, Horizon, PositionPolicy, Timeframe};

use crate::config::StrategyFileConfig;
use crate::error::{Error, Result};
use crate::evaluator::{Evaluator, RuleSet};
use crate::pipeline::{IndicatorConfig, IndicatorPipeline};
use crate::trend::TrendConfig;

/// A fully resolved strategy: what to fetch, what to compute, when to fire and
/// how trades are held.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDefinition {
    pub name: String,
    /// Exchange symbol, e.g. "SOLUSDT".
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Candles requested from the market-data source.
    pub history: usize,
    pub indicators: IndicatorConfig,
    pub rules: RuleSet,
    pub trend: Option<TrendConfig>,
    pub horizon: Horizon,
    /// Candles to skip after an opened trade in sequential runs.
    pub cooldown: Option<usize>,
    pub positions: PositionPolicy,
    pub payout_ratio: f64,
    pub diagnostics: DiagnosticConfig,
}

impl StrategyDefinition {
    pub fn validate(&self) -> Result<()> {
        self.indicators.validate()?;
        self.rules.validate()?;

        for key in self.rules.required_keys() {
            if !self.indicators.provides(key) {
                return Err(Error::InvalidConfig(format!(
                    "strategy '{}' reads {key} but its indicators do not compute it",
                    self.name
                )));
            }
        }
        if self.history == 0 {
            return Err(Error::InvalidConfig(format!("strategy '{}': history must be > 0", self.name)));
        }
        match self.horizon {
            Horizon::Candles(0) => {
                return Err(Error::InvalidConfig(format!("strategy '{}': horizon must be > 0", self.name)));
            }
            Horizon::WallClock(d) if d.is_zero() => {
                return Err(Error::InvalidConfig(format!("strategy '{}': horizon must be > 0", self.name)));
            }
            _ => {}
        }
        if self.cooldown == Some(0) {
            return Err(Error::InvalidConfig(format!("strategy '{}': cooldown must be > 0", self.name)));
        }
        if self.positions.capacity() == 0 {
            return Err(Error::InvalidConfig(format!("strategy '{}': max_open must be > 0", self.name)));
        }
        if !(self.payout_ratio.is_finite() && self.payout_ratio > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "strategy '{}': payout_ratio must be positive, got {}",
                self.name, self.payout_ratio
            )));
        }
        if let Some(trend) = &self.trend {
            if trend.span == 0 || trend.limit == 0 {
                return Err(Error::InvalidConfig(format!(
                    "strategy '{}': trend span and limit must be > 0",
                    self.name
                )));
            }
        }
        Ok(())
    }

    pub fn pipeline(&self) -> Result<IndicatorPipeline> {
        IndicatorPipeline::new(self.indicators.clone())
    }

    pub fn evaluator(&self) -> Result<Evaluator> {
        Evaluator::new(self.rules.clone())
    }

    /// Explicit cooldown, else the horizon in candles, else 1.
    pub fn cooldown(&self) -> usize {
        self.cooldown
            .or_else(|| self.horizon.candles())
            .unwrap_or(1)
    }
}

/// Named, validated strategy definitions loaded from a strategy file.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    definitions: Vec<StrategyDefinition>,
}

impl StrategyRegistry {
    pub fn from_config(file_cfg: &StrategyFileConfig) -> Result<Self> {
        let mut definitions = Vec::with_capacity(file_cfg.strategies.len());
        for cfg in &file_cfg.strategies {
            let def = cfg.resolve()?;
            if definitions.iter().any(|d: &StrategyDefinition| d.name == def.name) {
                return Err(Error::InvalidConfig(format!("duplicate strategy name '{}'", def.name)));
            }
            info!(name = %def.name, symbol = %def.symbol, timeframe = %def.timeframe, "Registered strategy");
            definitions.push(def);
        }
        Ok(Self { definitions })
    }

    pub fn get(&self, name: &str) -> Option<&StrategyDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StrategyDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
