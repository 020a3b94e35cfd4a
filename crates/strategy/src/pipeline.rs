use serde::{Deserialize, Serialize};
use tracing::debug;

use common::Candle;

use crate::error::{Error, Result};
use crate::indicators::{
    AdxIndicator, AdxMethod, BollingerIndicator, DriftIndicator, EmaIndicator, RsiIndicator,
    RsiSmoothing, StochasticIndicator, VolumeIndicator,
};
use crate::snapshot::{IndicatorKey, IndicatorSnapshot};

/// Which indicator families to compute, with their windows and constants.
/// An absent section is not computed and its columns stay `None`.
///
/// Example (TOML):
/// ```toml
/// [indicators.bollinger]
/// window = 20
/// k = 2.0
///
/// [indicators.adx]
/// period = 14
/// method = "single_candle"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorConfig {
    #[serde(default)]
    pub ema: Option<EmaPairConfig>,
    #[serde(default)]
    pub trend_ema: Option<TrendEmaConfig>,
    #[serde(default)]
    pub rsi: Option<RsiConfig>,
    #[serde(default)]
    pub adx: Option<AdxConfig>,
    #[serde(default)]
    pub bollinger: Option<BollingerConfig>,
    #[serde(default)]
    pub drift: Option<DriftConfig>,
    #[serde(default)]
    pub volume: Option<VolumeConfig>,
    #[serde(default)]
    pub stochastic: Option<StochasticConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmaPairConfig {
    pub fast: usize,
    pub slow: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendEmaConfig {
    pub span: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiConfig {
    pub period: usize,
    #[serde(default)]
    pub smoothing: RsiSmoothing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdxConfig {
    pub period: usize,
    #[serde(default)]
    pub method: AdxMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollingerConfig {
    pub window: usize,
    pub k: f64,
    #[serde(default)]
    pub bandwidth_window: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    pub window: usize,
    pub horizon: usize,
    /// Second, slower window reported as `strategic_prob`.
    #[serde(default)]
    pub strategic_window: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub window: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticConfig {
    pub window: usize,
}

impl IndicatorConfig {
    /// Reject windows the kernels cannot work with.
    pub fn validate(&self) -> Result<()> {
        fn at_least(name: &str, value: usize, min: usize) -> Result<()> {
            if value < min {
                return Err(Error::InvalidConfig(format!("{name} must be >= {min}, got {value}")));
            }
            Ok(())
        }

        if let Some(ema) = &self.ema {
            at_least("ema.fast", ema.fast, 1)?;
            at_least("ema.slow", ema.slow, 1)?;
        }
        if let Some(t) = &self.trend_ema {
            at_least("trend_ema.span", t.span, 1)?;
        }
        if let Some(rsi) = &self.rsi {
            at_least("rsi.period", rsi.period, 2)?;
        }
        if let Some(adx) = &self.adx {
            at_least("adx.period", adx.period, 2)?;
        }
        if let Some(bb) = &self.bollinger {
            at_least("bollinger.window", bb.window, 2)?;
            if let Some(w) = bb.bandwidth_window {
                at_least("bollinger.bandwidth_window", w, 1)?;
            }
            if !(bb.k.is_finite() && bb.k > 0.0) {
                return Err(Error::InvalidConfig(format!("bollinger.k must be positive, got {}", bb.k)));
            }
        }
        if let Some(d) = &self.drift {
            at_least("drift.window", d.window, 2)?;
            at_least("drift.horizon", d.horizon, 1)?;
            if let Some(w) = d.strategic_window {
                at_least("drift.strategic_window", w, 2)?;
            }
        }
        if let Some(v) = &self.volume {
            at_least("volume.window", v.window, 1)?;
        }
        if let Some(s) = &self.stochastic {
            at_least("stochastic.window", s.window, 1)?;
        }
        Ok(())
    }

    /// Whether this configuration fills `key` at all.
    pub fn provides(&self, key: IndicatorKey) -> bool {
        match key {
            IndicatorKey::EmaFast | IndicatorKey::EmaSlow => self.ema.is_some(),
            IndicatorKey::EmaTrend => self.trend_ema.is_some(),
            IndicatorKey::Rsi => self.rsi.is_some(),
            IndicatorKey::Adx => self.adx.is_some(),
            IndicatorKey::BbMean
            | IndicatorKey::BbStd
            | IndicatorKey::BbUpper
            | IndicatorKey::BbLower
            | IndicatorKey::Bandwidth
            | IndicatorKey::ZScore => self.bollinger.is_some(),
            IndicatorKey::BandwidthMa => self
                .bollinger
                .as_ref()
                .is_some_and(|b| b.bandwidth_window.is_some()),
            IndicatorKey::TacticalProb => self.drift.is_some(),
            IndicatorKey::StrategicProb => self
                .drift
                .as_ref()
                .is_some_and(|d| d.strategic_window.is_some()),
            IndicatorKey::StochK => self.stochastic.is_some(),
            IndicatorKey::VolumeMa => self.volume.is_some(),
        }
    }

    /// Number of candles needed before every configured column can be defined.
    pub fn warmup(&self) -> Result<usize> {
        self.validate()?;
        let mut rows = 0usize;
        if let Some(rsi) = &self.rsi {
            rows = rows.max(rsi.period - 1);
        }
        if let Some(adx) = &self.adx {
            rows = rows.max(AdxIndicator::new(adx.period, adx.method).lookback());
        }
        if let Some(bb) = &self.bollinger {
            let extra = bb.bandwidth_window.map_or(0, |w| w - 1);
            rows = rows.max(bb.window - 1 + extra);
        }
        if let Some(d) = &self.drift {
            rows = rows.max(d.window.max(d.strategic_window.unwrap_or(0)));
        }
        if let Some(v) = &self.volume {
            rows = rows.max(v.window - 1);
        }
        if let Some(s) = &self.stochastic {
            rows = rows.max(s.window - 1);
        }
        Ok(rows)
    }
}

/// Turns a candle series into one [`IndicatorSnapshot`] per candle.
///
/// Holds only configuration, so computing twice over the same candles yields
/// identical snapshots.
#[derive(Debug, Clone)]
pub struct IndicatorPipeline {
    config: IndicatorConfig,
    warmup: usize,
}

impl IndicatorPipeline {
    pub fn new(config: IndicatorConfig) -> Result<Self> {
        let warmup = config.warmup()?;
        Ok(Self { config, warmup })
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn warmup(&self) -> usize {
        self.warmup
    }

    pub fn compute(&self, candles: &[Candle]) -> Vec<IndicatorSnapshot> {
        let n = candles.len();
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let none = || vec![None; n];
        let cfg = &self.config;

        let (ema_fast, ema_slow) = match &cfg.ema {
            Some(e) => (
                EmaIndicator::new(e.fast).compute(&closes),
                EmaIndicator::new(e.slow).compute(&closes),
            ),
            None => (none(), none()),
        };
        let ema_trend = match &cfg.trend_ema {
            Some(t) => EmaIndicator::new(t.span).compute(&closes),
            None => none(),
        };
        let rsi = match &cfg.rsi {
            Some(r) => RsiIndicator::new(r.period, r.smoothing).compute(&closes),
            None => none(),
        };
        let adx = match &cfg.adx {
            Some(a) => AdxIndicator::new(a.period, a.method).compute(candles),
            None => none(),
        };
        let bb = match &cfg.bollinger {
            Some(b) => BollingerIndicator::new(b.window, b.k, b.bandwidth_window).compute(&closes),
            None => crate::indicators::BollingerSeries {
                mean: none(),
                std: none(),
                upper: none(),
                lower: none(),
                bandwidth: none(),
                bandwidth_ma: none(),
                z_score: none(),
            },
        };
        let (tactical, strategic) = match &cfg.drift {
            Some(d) => (
                DriftIndicator::new(d.window, d.horizon).compute(&closes),
                match d.strategic_window {
                    Some(w) => DriftIndicator::new(w, d.horizon).compute(&closes),
                    None => none(),
                },
            ),
            None => (none(), none()),
        };
        let volume_ma = match &cfg.volume {
            Some(v) => VolumeIndicator::new(v.window).compute(candles),
            None => none(),
        };
        let stoch_k = match &cfg.stochastic {
            Some(s) => StochasticIndicator::new(s.window).compute(candles),
            None => none(),
        };

        debug!(candles = n, warmup = self.warmup, "Indicator pipeline computed");

        candles
            .iter()
            .enumerate()
            .map(|(i, c)| IndicatorSnapshot {
                index: i,
                timestamp: c.timestamp,
                open: c.open,
                close: c.close,
                volume: c.volume,
                body: (c.close - c.open).abs(),
                upper_wick: c.high - c.open.max(c.close),
                lower_wick: c.open.min(c.close) - c.low,
                ema_fast: ema_fast[i],
                ema_slow: ema_slow[i],
                ema_trend: ema_trend[i],
                rsi: rsi[i],
                adx: adx[i],
                bb_mean: bb.mean[i],
                bb_std: bb.std[i],
                bb_upper: bb.upper[i],
                bb_lower: bb.lower[i],
                bandwidth: bb.bandwidth[i],
                bandwidth_ma: bb.bandwidth_ma[i],
                z_score: bb.z_score[i],
                tactical_prob: tactical[i],
                strategic_prob: strategic[i],
                stoch_k: stoch_k[i],
                volume_ma: volume_ma[i],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_candles;

    fn full_config() -> IndicatorConfig {
        IndicatorConfig {
            ema: Some(EmaPairConfig { fast: 9, slow: 21 }),
            trend_ema: Some(TrendEmaConfig { span: 20 }),
            rsi: Some(RsiConfig { period: 7, smoothing: RsiSmoothing::Simple }),
            adx: Some(AdxConfig { period: 14, method: AdxMethod::RollingSum }),
            bollinger: Some(BollingerConfig { window: 20, k: 2.0, bandwidth_window: Some(20) }),
            drift: Some(DriftConfig { window: 30, horizon: 15, strategic_window: Some(60) }),
            volume: Some(VolumeConfig { window: 5 }),
            stochastic: Some(StochasticConfig { window: 14 }),
        }
    }

    fn wavy(n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64 * 0.05)
            .collect();
        make_candles(&closes)
    }

    #[test]
    fn one_snapshot_per_candle() {
        let candles = wavy(120);
        let snaps = IndicatorPipeline::new(full_config()).unwrap().compute(&candles);
        assert_eq!(snaps.len(), 120);
        assert!(snaps.iter().enumerate().all(|(i, s)| s.index == i));
    }

    #[test]
    fn recomputing_is_identical() {
        let candles = wavy(150);
        let pipeline = IndicatorPipeline::new(full_config()).unwrap();
        assert_eq!(pipeline.compute(&candles), pipeline.compute(&candles));
    }

    #[test]
    fn unconfigured_columns_stay_undefined() {
        let cfg = IndicatorConfig {
            volume: Some(VolumeConfig { window: 5 }),
            ..IndicatorConfig::default()
        };
        let snaps = IndicatorPipeline::new(cfg).unwrap().compute(&wavy(40));
        let last = &snaps[39];
        assert!(last.volume_ma.is_some());
        assert!(last.rsi.is_none() && last.adx.is_none() && last.z_score.is_none());
    }

    #[test]
    fn warmup_covers_every_configured_column() {
        let cfg = full_config();
        let warmup = cfg.warmup().unwrap();
        assert_eq!(warmup, 60);
        let pipeline = IndicatorPipeline::new(cfg.clone()).unwrap();
        assert_eq!(pipeline.warmup(), warmup);
        let snaps = pipeline.compute(&wavy(100));
        let keys: Vec<IndicatorKey> = [
            IndicatorKey::Rsi,
            IndicatorKey::Adx,
            IndicatorKey::ZScore,
            IndicatorKey::BandwidthMa,
            IndicatorKey::TacticalProb,
            IndicatorKey::StrategicProb,
            IndicatorKey::VolumeMa,
            IndicatorKey::StochK,
        ]
        .into_iter()
        .filter(|k| cfg.provides(*k))
        .collect();
        assert!(snaps[warmup - 1].first_missing(&keys).is_some());
        assert!(snaps[warmup].first_missing(&keys).is_none());
    }

    #[test]
    fn candle_shape_metrics() {
        let mut candles = make_candles(&[100.0, 101.0]);
        candles[1].open = 100.5;
        candles[1].close = 101.0;
        candles[1].high = 103.0;
        candles[1].low = 99.0;
        let snaps = IndicatorPipeline::new(IndicatorConfig::default()).unwrap().compute(&candles);
        assert_eq!(snaps[1].body, 0.5);
        assert_eq!(snaps[1].upper_wick, 2.0);
        assert_eq!(snaps[1].lower_wick, 1.5);
    }

    #[test]
    fn invalid_window_rejected() {
        let cfg = IndicatorConfig {
            rsi: Some(RsiConfig { period: 1, smoothing: RsiSmoothing::Simple }),
            ..IndicatorConfig::default()
        };
        assert!(matches!(IndicatorPipeline::new(cfg), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn warmup_of_zero_window_is_an_error() {
        let cfg = IndicatorConfig {
            volume: Some(VolumeConfig { window: 0 }),
            ..IndicatorConfig::default()
        };
        assert!(matches!(cfg.warmup(), Err(Error::InvalidConfig(_))));

        let cfg = IndicatorConfig {
            adx: Some(AdxConfig { period: 0, method: AdxMethod::Wilder }),
            ..IndicatorConfig::default()
        };
        assert!(matches!(cfg.warmup(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn config_parses_from_toml() {
        let cfg: IndicatorConfig = toml::from_str(
            r#"
            [adx]
            period = 14
            method = "single_candle"

            [bollinger]
            window = 20
            k = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.adx.as_ref().unwrap().method, AdxMethod::SingleCandle);
        assert!(cfg.bollinger.as_ref().unwrap().bandwidth_window.is_none());
        assert!(cfg.rsi.is_none());
    }
}
