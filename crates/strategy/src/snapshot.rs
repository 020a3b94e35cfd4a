use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names one optional indicator column of an [`IndicatorSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKey {
    EmaFast,
    EmaSlow,
    EmaTrend,
    Rsi,
    Adx,
    BbMean,
    BbStd,
    BbUpper,
    BbLower,
    Bandwidth,
    BandwidthMa,
    ZScore,
    TacticalProb,
    StrategicProb,
    StochK,
    VolumeMa,
}

impl std::fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IndicatorKey::EmaFast => "ema_fast",
            IndicatorKey::EmaSlow => "ema_slow",
            IndicatorKey::EmaTrend => "ema_trend",
            IndicatorKey::Rsi => "rsi",
            IndicatorKey::Adx => "adx",
            IndicatorKey::BbMean => "bb_mean",
            IndicatorKey::BbStd => "bb_std",
            IndicatorKey::BbUpper => "bb_upper",
            IndicatorKey::BbLower => "bb_lower",
            IndicatorKey::Bandwidth => "bandwidth",
            IndicatorKey::BandwidthMa => "bandwidth_ma",
            IndicatorKey::ZScore => "z_score",
            IndicatorKey::TacticalProb => "tactical_prob",
            IndicatorKey::StrategicProb => "strategic_prob",
            IndicatorKey::StochK => "stoch_k",
            IndicatorKey::VolumeMa => "volume_ma",
        };
        f.write_str(name)
    }
}

/// Indicator values for one candle.
///
/// Optional fields are `None` inside their warm-up region, when their family
/// is not configured, or when the row is arithmetically degenerate. The raw
/// candle fields and the candle-shape metrics are always defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub close: f64,
    pub volume: f64,

    /// `|close - open|`
    pub body: f64,
    /// `high - max(open, close)`
    pub upper_wick: f64,
    /// `min(open, close) - low`
    pub lower_wick: f64,

    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub ema_trend: Option<f64>,
    pub rsi: Option<f64>,
    pub adx: Option<f64>,
    pub bb_mean: Option<f64>,
    pub bb_std: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bandwidth: Option<f64>,
    pub bandwidth_ma: Option<f64>,
    pub z_score: Option<f64>,
    pub tactical_prob: Option<f64>,
    pub strategic_prob: Option<f64>,
    pub stoch_k: Option<f64>,
    pub volume_ma: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn value(&self, key: IndicatorKey) -> Option<f64> {
        match key {
            IndicatorKey::EmaFast => self.ema_fast,
            IndicatorKey::EmaSlow => self.ema_slow,
            IndicatorKey::EmaTrend => self.ema_trend,
            IndicatorKey::Rsi => self.rsi,
            IndicatorKey::Adx => self.adx,
            IndicatorKey::BbMean => self.bb_mean,
            IndicatorKey::BbStd => self.bb_std,
            IndicatorKey::BbUpper => self.bb_upper,
            IndicatorKey::BbLower => self.bb_lower,
            IndicatorKey::Bandwidth => self.bandwidth,
            IndicatorKey::BandwidthMa => self.bandwidth_ma,
            IndicatorKey::ZScore => self.z_score,
            IndicatorKey::TacticalProb => self.tactical_prob,
            IndicatorKey::StrategicProb => self.strategic_prob,
            IndicatorKey::StochK => self.stoch_k,
            IndicatorKey::VolumeMa => self.volume_ma,
        }
    }

    /// First key in `keys` whose value is undefined on this row.
    pub fn first_missing(&self, keys: &[IndicatorKey]) -> Option<IndicatorKey> {
        keys.iter().copied().find(|k| self.value(*k).is_none())
    }

    /// Volume below its short average. Undefined while the average is.
    pub fn volume_exhausted(&self) -> Option<bool> {
        self.volume_ma.map(|ma| self.volume < ma)
    }
}
