//! Built-in strategy family.
//!
//! Each preset is a rule set plus the indicator windows it reads. They differ
//! only in data: the pipeline and evaluator are shared.

use std::time::Duration;

use common::{DiagnosticConfig, Horizon, PositionPolicy, Timeframe, DEFAULT_PAYOUT_RATIO};

use crate::error::{Error, Result};
use crate::evaluator::{Predicate, RuleSet};
use crate::indicators::{AdxMethod, RsiSmoothing};
use crate::pipeline::{
    AdxConfig, BollingerConfig, DriftConfig, EmaPairConfig, IndicatorConfig, RsiConfig,
    VolumeConfig,
};
use crate::registry::StrategyDefinition;
use crate::trend::{Confluence, TrendConfig};

pub struct Preset {
    pub name: &'static str,
    pub summary: &'static str,
    build: fn() -> StrategyDefinition,
}

impl Preset {
    pub fn definition(&self) -> StrategyDefinition {
        (self.build)()
    }
}

static PRESETS: &[Preset] = &[
    Preset {
        name: "trend_confluence",
        summary: "EMA 9/21 cross with RSI and ADX > 25, gated by the H1 EMA20 trend",
        build: trend_confluence,
    },
    Preset {
        name: "band_reversion",
        summary: "Close outside Bollinger 20/2.0 while single-candle ADX < 30",
        build: band_reversion,
    },
    Preset {
        name: "volume_exhaustion",
        summary: "Drift probability against z-score extreme with falling volume",
        build: volume_exhaustion,
    },
    Preset {
        name: "adx_sniper",
        summary: "Volume exhaustion plus 0.7 wick rejection and rolling ADX < 30",
        build: adx_sniper,
    },
    Preset {
        name: "rsi_sniper",
        summary: "ADX sniper with 0.6 wick rejection and RSI(7) beyond 70/30",
        build: rsi_sniper,
    },
    Preset {
        name: "bandwidth_sentinel",
        summary: "Z-score 2.0 extreme with bands wider than their 20-candle average",
        build: bandwidth_sentinel,
    },
    Preset {
        name: "drift_alignment",
        summary: "Live: tactical 30-candle and strategic 60-candle drift agree",
        build: drift_alignment,
    },
];

pub fn presets() -> &'static [Preset] {
    PRESETS
}

pub fn preset(name: &str) -> Result<StrategyDefinition> {
    PRESETS
        .iter()
        .find(|p| p.name == name)
        .map(Preset::definition)
        .ok_or_else(|| Error::UnknownPreset(name.to_string()))
}

fn base(name: &str, symbol: &str) -> StrategyDefinition {
    StrategyDefinition {
        name: name.to_string(),
        symbol: symbol.to_string(),
        timeframe: Timeframe::M1,
        history: 1440,
        indicators: IndicatorConfig::default(),
        rules: RuleSet {
            name: name.to_string(),
            ..RuleSet::default()
        },
        trend: None,
        horizon: Horizon::Candles(15),
        cooldown: None,
        positions: PositionPolicy::Single,
        payout_ratio: DEFAULT_PAYOUT_RATIO,
        diagnostics: DiagnosticConfig::default(),
    }
}

fn trend_confluence() -> StrategyDefinition {
    let mut def = base("trend_confluence", "BTCUSDT");
    def.indicators = IndicatorConfig {
        ema: Some(EmaPairConfig { fast: 9, slow: 21 }),
        rsi: Some(RsiConfig { period: 14, smoothing: RsiSmoothing::Wilder }),
        adx: Some(AdxConfig { period: 14, method: AdxMethod::Wilder }),
        ..IndicatorConfig::default()
    };
    def.rules.up = vec![
        Predicate::AdxAbove { threshold: 25.0 },
        Predicate::EmaFastAboveSlow,
        Predicate::RsiBelow { threshold: 70.0 },
        Predicate::BullishCandle,
    ];
    def.rules.down = vec![
        Predicate::AdxAbove { threshold: 25.0 },
        Predicate::EmaFastBelowSlow,
        Predicate::RsiAbove { threshold: 30.0 },
        Predicate::BearishCandle,
    ];
    def.rules.confluence = Confluence::Agree;
    def.trend = Some(TrendConfig {
        timeframe: Timeframe::H1,
        span: 20,
        limit: 48,
    });
    // Every candle is scanned; overlapping trades are tracked independently.
    def.cooldown = Some(1);
    def.positions = PositionPolicy::Multi { max_open: 16 };
    def.diagnostics.breakout_fraction = 0.0002;
    def
}

fn band_reversion() -> StrategyDefinition {
    let mut def = base("band_reversion", "BTCUSDT");
    def.indicators = IndicatorConfig {
        bollinger: Some(BollingerConfig { window: 20, k: 2.0, bandwidth_window: None }),
        adx: Some(AdxConfig { period: 14, method: AdxMethod::SingleCandle }),
        ..IndicatorConfig::default()
    };
    def.rules.up = vec![
        Predicate::AdxBelow { threshold: 30.0 },
        Predicate::CloseBelowLowerBand,
    ];
    def.rules.down = vec![
        Predicate::AdxBelow { threshold: 30.0 },
        Predicate::CloseAboveUpperBand,
    ];
    def
}

fn exhaustion_indicators() -> IndicatorConfig {
    IndicatorConfig {
        drift: Some(DriftConfig { window: 30, horizon: 15, strategic_window: None }),
        bollinger: Some(BollingerConfig { window: 20, k: 2.0, bandwidth_window: None }),
        volume: Some(VolumeConfig { window: 5 }),
        ..IndicatorConfig::default()
    }
}

fn exhaustion_rules(z: f64) -> (Vec<Predicate>, Vec<Predicate>) {
    let up = vec![
        Predicate::TacticalProbBelow { threshold: 0.40 },
        Predicate::ZScoreBelow { threshold: -z },
        Predicate::VolumeExhausted,
    ];
    let down = vec![
        Predicate::TacticalProbAbove { threshold: 0.60 },
        Predicate::ZScoreAbove { threshold: z },
        Predicate::VolumeExhausted,
    ];
    (up, down)
}

fn volume_exhaustion() -> StrategyDefinition {
    let mut def = base("volume_exhaustion", "SOLUSDT");
    def.indicators = exhaustion_indicators();
    (def.rules.up, def.rules.down) = exhaustion_rules(1.5);
    def
}

fn with_sniper_filters(def: &mut StrategyDefinition, wick_ratio: f64) {
    def.indicators.adx = Some(AdxConfig { period: 14, method: AdxMethod::RollingSum });
    def.rules.up.extend([
        Predicate::LowerWickRejection { ratio: wick_ratio },
        Predicate::AdxBelow { threshold: 30.0 },
    ]);
    def.rules.down.extend([
        Predicate::UpperWickRejection { ratio: wick_ratio },
        Predicate::AdxBelow { threshold: 30.0 },
    ]);
}

fn adx_sniper() -> StrategyDefinition {
    let mut def = volume_exhaustion();
    def.name = "adx_sniper".into();
    def.rules.name = def.name.clone();
    with_sniper_filters(&mut def, 0.7);
    def
}

fn rsi_sniper() -> StrategyDefinition {
    let mut def = volume_exhaustion();
    def.name = "rsi_sniper".into();
    def.rules.name = def.name.clone();
    with_sniper_filters(&mut def, 0.6);
    def.indicators.rsi = Some(RsiConfig { period: 7, smoothing: RsiSmoothing::Simple });
    def.rules.up.push(Predicate::RsiBelow { threshold: 30.0 });
    def.rules.down.push(Predicate::RsiAbove { threshold: 70.0 });
    def
}

fn bandwidth_sentinel() -> StrategyDefinition {
    let mut def = base("bandwidth_sentinel", "SOLUSDT");
    def.indicators = exhaustion_indicators();
    if let Some(bb) = def.indicators.bollinger.as_mut() {
        bb.bandwidth_window = Some(20);
    }
    (def.rules.up, def.rules.down) = exhaustion_rules(2.0);
    def.rules.up.push(Predicate::BandwidthExpanding);
    def.rules.down.push(Predicate::BandwidthExpanding);
    with_sniper_filters(&mut def, 0.6);
    def
}

fn drift_alignment() -> StrategyDefinition {
    let mut def = base("drift_alignment", "ETHUSDT");
    def.history = 100;
    def.indicators = IndicatorConfig {
        drift: Some(DriftConfig { window: 30, horizon: 15, strategic_window: Some(60) }),
        ..IndicatorConfig::default()
    };
    def.rules.up = vec![
        Predicate::TacticalProbAbove { threshold: 0.60 },
        Predicate::StrategicProbAbove { threshold: 0.50 },
    ];
    def.rules.down = vec![
        Predicate::TacticalProbBelow { threshold: 0.40 },
        Predicate::StrategicProbBelow { threshold: 0.50 },
    ];
    def.horizon = Horizon::WallClock(Duration::from_secs(15 * 60));
    def
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_is_valid() {
        for p in presets() {
            let def = p.definition();
            assert_eq!(def.name, p.name);
            def.validate().unwrap_or_else(|e| panic!("{} invalid: {e}", p.name));
        }
    }

    #[test]
    fn unknown_preset_is_an_error() {
        assert!(matches!(preset("nope"), Err(Error::UnknownPreset(_))));
    }

    #[test]
    fn rsi_sniper_extends_adx_sniper() {
        let def = preset("rsi_sniper").unwrap();
        assert_eq!(def.rules.down.len(), 6);
        assert!(def.rules.down.contains(&Predicate::UpperWickRejection { ratio: 0.6 }));
        assert!(def.rules.down.contains(&Predicate::RsiAbove { threshold: 70.0 }));
        assert_eq!(def.indicators.adx.unwrap().method, AdxMethod::RollingSum);
    }

    #[test]
    fn drift_alignment_is_wall_clock() {
        let def = preset("drift_alignment").unwrap();
        assert_eq!(def.horizon, Horizon::WallClock(Duration::from_secs(900)));
        assert_eq!(def.positions, PositionPolicy::Single);
    }

    #[test]
    fn default_cooldown_is_horizon() {
        assert_eq!(preset("band_reversion").unwrap().cooldown(), 15);
        assert_eq!(preset("trend_confluence").unwrap().cooldown(), 1);
    }
}
