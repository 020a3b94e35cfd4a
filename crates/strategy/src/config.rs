use serde::{Deserialize, Serialize};

use common::{DiagnosticConfig, Horizon, PositionPolicy, Timeframe, DEFAULT_PAYOUT_RATIO};

use crate::error::{Error, Result};
use crate::evaluator::RuleSet;
use crate::pipeline::IndicatorConfig;
use crate::presets::preset;
use crate::registry::StrategyDefinition;
use crate::trend::TrendConfig;

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// name = "sol-sniper"
/// preset = "adx_sniper"
/// symbol = "SOLUSDT"
///
/// [[strategy]]
/// name = "btc-bands"
/// symbol = "BTCUSDT"
/// timeframe = "1m"
/// horizon = { candles = 15 }
///
/// [strategy.indicators.bollinger]
/// window = 20
/// k = 2.0
///
/// [strategy.rules]
/// up = [{ kind = "close_below_lower_band" }]
/// down = [{ kind = "close_above_upper_band" }]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

/// One `[[strategy]]` entry. A `preset` seeds every field; any section given
/// here replaces the preset's section as a whole.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    /// Human-readable name shown in logs and reports.
    pub name: String,
    #[serde(default)]
    pub preset: Option<String>,
    /// Symbol, e.g. "SOLUSDT" or "SOL/USDT".
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    #[serde(default)]
    pub history: Option<usize>,
    #[serde(default)]
    pub horizon: Option<Horizon>,
    #[serde(default)]
    pub cooldown: Option<usize>,
    #[serde(default)]
    pub positions: Option<PositionPolicy>,
    #[serde(default)]
    pub payout_ratio: Option<f64>,
    #[serde(default)]
    pub trend: Option<TrendConfig>,
    #[serde(default)]
    pub indicators: Option<IndicatorConfig>,
    #[serde(default)]
    pub rules: Option<RuleSet>,
    #[serde(default)]
    pub diagnostics: Option<DiagnosticConfig>,
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(common::Error::from)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl StrategyConfig {
    /// Merge this entry over its preset (if any) and validate the result.
    pub fn resolve(&self) -> Result<StrategyDefinition> {
        let mut def = match &self.preset {
            Some(name) => preset(name)?,
            None => StrategyDefinition {
                name: self.name.clone(),
                symbol: self.symbol.clone().ok_or_else(|| {
                    Error::InvalidConfig(format!("strategy '{}' needs a symbol or a preset", self.name))
                })?,
                timeframe: Timeframe::default(),
                history: 1440,
                indicators: self.indicators.clone().ok_or_else(|| {
                    Error::InvalidConfig(format!("strategy '{}' needs indicators or a preset", self.name))
                })?,
                rules: self.rules.clone().ok_or_else(|| {
                    Error::InvalidConfig(format!("strategy '{}' needs rules or a preset", self.name))
                })?,
                trend: None,
                horizon: Horizon::default(),
                cooldown: None,
                positions: PositionPolicy::default(),
                payout_ratio: DEFAULT_PAYOUT_RATIO,
                diagnostics: DiagnosticConfig::default(),
            },
        };

        def.name = self.name.clone();
        if let Some(symbol) = &self.symbol {
            def.symbol = normalize_symbol(symbol);
        }
        if let Some(tf) = self.timeframe {
            def.timeframe = tf;
        }
        if let Some(history) = self.history {
            def.history = history;
        }
        if let Some(horizon) = self.horizon {
            def.horizon = horizon;
        }
        if self.cooldown.is_some() {
            def.cooldown = self.cooldown;
        }
        if let Some(positions) = self.positions {
            def.positions = positions;
        }
        if let Some(ratio) = self.payout_ratio {
            def.payout_ratio = ratio;
        }
        if let Some(trend) = &self.trend {
            def.trend = Some(trend.clone());
        }
        if let Some(indicators) = &self.indicators {
            def.indicators = indicators.clone();
        }
        if let Some(rules) = &self.rules {
            def.rules = rules.clone();
        }
        if let Some(diagnostics) = self.diagnostics {
            def.diagnostics = diagnostics;
        }
        def.rules.name = def.name.clone();

        def.validate()?;
        Ok(def)
    }
}

/// `"SOL/USDT"` → `"SOLUSDT"`; already-joined symbols are upper-cased.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.replace(['/', '-'], "").to_uppercase()
}
