//! Configuration-driven signal evaluation.
//!
//! A [`RuleSet`] holds one conjunction of [`Predicate`]s per direction. A
//! direction fires when its list is non-empty and every predicate holds on the
//! snapshot. Evaluation is a pure function of the snapshot and the optional
//! trend context.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::Direction;

use crate::error::{Error, Result};
use crate::snapshot::{IndicatorKey, IndicatorSnapshot};
use crate::trend::{Confluence, TrendContext};

/// One threshold test over an [`IndicatorSnapshot`].
///
/// TOML form: `{ kind = "z_score_above", threshold = 1.5 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    AdxBelow { threshold: f64 },
    AdxAbove { threshold: f64 },
    ZScoreAbove { threshold: f64 },
    ZScoreBelow { threshold: f64 },
    CloseAboveUpperBand,
    CloseBelowLowerBand,
    VolumeExhausted,
    /// `upper_wick > body * ratio`
    UpperWickRejection { ratio: f64 },
    /// `lower_wick > body * ratio`
    LowerWickRejection { ratio: f64 },
    RsiAbove { threshold: f64 },
    RsiBelow { threshold: f64 },
    EmaFastAboveSlow,
    EmaFastBelowSlow,
    TacticalProbAbove { threshold: f64 },
    TacticalProbBelow { threshold: f64 },
    StrategicProbAbove { threshold: f64 },
    StrategicProbBelow { threshold: f64 },
    /// Bandwidth above its moving average (bands are not squeezing).
    BandwidthExpanding,
    BullishCandle,
    BearishCandle,
}

impl Predicate {
    /// Indicator columns this predicate reads.
    pub fn required_keys(&self) -> &'static [IndicatorKey] {
        use IndicatorKey as K;
        match self {
            Predicate::AdxBelow { .. } | Predicate::AdxAbove { .. } => &[K::Adx],
            Predicate::ZScoreAbove { .. } | Predicate::ZScoreBelow { .. } => &[K::ZScore],
            Predicate::CloseAboveUpperBand => &[K::BbUpper],
            Predicate::CloseBelowLowerBand => &[K::BbLower],
            Predicate::VolumeExhausted => &[K::VolumeMa],
            Predicate::UpperWickRejection { .. } | Predicate::LowerWickRejection { .. } => &[],
            Predicate::RsiAbove { .. } | Predicate::RsiBelow { .. } => &[K::Rsi],
            Predicate::EmaFastAboveSlow | Predicate::EmaFastBelowSlow => &[K::EmaFast, K::EmaSlow],
            Predicate::TacticalProbAbove { .. } | Predicate::TacticalProbBelow { .. } => {
                &[K::TacticalProb]
            }
            Predicate::StrategicProbAbove { .. } | Predicate::StrategicProbBelow { .. } => {
                &[K::StrategicProb]
            }
            Predicate::BandwidthExpanding => &[K::Bandwidth, K::BandwidthMa],
            Predicate::BullishCandle | Predicate::BearishCandle => &[],
        }
    }

    /// Whether the predicate holds. An undefined input never holds.
    pub fn holds(&self, s: &IndicatorSnapshot) -> bool {
        self.test(s).unwrap_or(false)
    }

    fn test(&self, s: &IndicatorSnapshot) -> Option<bool> {
        let verdict = match self {
            Predicate::AdxBelow { threshold } => s.adx? < *threshold,
            Predicate::AdxAbove { threshold } => s.adx? > *threshold,
            Predicate::ZScoreAbove { threshold } => s.z_score? > *threshold,
            Predicate::ZScoreBelow { threshold } => s.z_score? < *threshold,
            Predicate::CloseAboveUpperBand => s.close > s.bb_upper?,
            Predicate::CloseBelowLowerBand => s.close < s.bb_lower?,
            Predicate::VolumeExhausted => s.volume_exhausted()?,
            Predicate::UpperWickRejection { ratio } => s.upper_wick > s.body * ratio,
            Predicate::LowerWickRejection { ratio } => s.lower_wick > s.body * ratio,
            Predicate::RsiAbove { threshold } => s.rsi? > *threshold,
            Predicate::RsiBelow { threshold } => s.rsi? < *threshold,
            Predicate::EmaFastAboveSlow => s.ema_fast? > s.ema_slow?,
            Predicate::EmaFastBelowSlow => s.ema_fast? < s.ema_slow?,
            Predicate::TacticalProbAbove { threshold } => s.tactical_prob? > *threshold,
            Predicate::TacticalProbBelow { threshold } => s.tactical_prob? < *threshold,
            Predicate::StrategicProbAbove { threshold } => s.strategic_prob? > *threshold,
            Predicate::StrategicProbBelow { threshold } => s.strategic_prob? < *threshold,
            Predicate::BandwidthExpanding => s.bandwidth? > s.bandwidth_ma?,
            Predicate::BullishCandle => s.close > s.open,
            Predicate::BearishCandle => s.close < s.open,
        };
        Some(verdict)
    }

    fn constant(&self) -> Option<f64> {
        match self {
            Predicate::AdxBelow { threshold }
            | Predicate::AdxAbove { threshold }
            | Predicate::ZScoreAbove { threshold }
            | Predicate::ZScoreBelow { threshold }
            | Predicate::RsiAbove { threshold }
            | Predicate::RsiBelow { threshold }
            | Predicate::TacticalProbAbove { threshold }
            | Predicate::TacticalProbBelow { threshold }
            | Predicate::StrategicProbAbove { threshold }
            | Predicate::StrategicProbBelow { threshold } => Some(*threshold),
            Predicate::UpperWickRejection { ratio } | Predicate::LowerWickRejection { ratio } => {
                Some(*ratio)
            }
            _ => None,
        }
    }
}

/// The UP and DOWN conjunctions of one strategy, plus its confluence policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuleSet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub up: Vec<Predicate>,
    #[serde(default)]
    pub down: Vec<Predicate>,
    #[serde(default)]
    pub confluence: Confluence,
}

impl RuleSet {
    /// Union of the indicator columns read by either direction.
    pub fn required_keys(&self) -> Vec<IndicatorKey> {
        let keys: BTreeSet<IndicatorKey> = self
            .up
            .iter()
            .chain(&self.down)
            .flat_map(|p| p.required_keys().iter().copied())
            .collect();
        keys.into_iter().collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.up.is_empty() && self.down.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "rule set '{}' has no predicates in either direction",
                self.name
            )));
        }
        for p in self.up.iter().chain(&self.down) {
            if let Some(c) = p.constant() {
                if !c.is_finite() {
                    return Err(Error::InvalidConfig(format!(
                        "rule set '{}': non-finite constant in {p:?}",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A directional entry opportunity at one candle.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub index: usize,
    pub direction: Direction,
    pub snapshot: IndicatorSnapshot,
}

/// Verdict for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Signal(Signal),
    NoSignal,
    /// Both directions satisfied; no signal is emitted.
    Ambiguous,
    /// The direction fired but the trend context rejected it.
    Vetoed { direction: Direction },
    /// A required indicator is undefined on this row.
    Unready { missing: IndicatorKey },
}

impl Evaluation {
    pub fn signal(self) -> Option<Signal> {
        match self {
            Evaluation::Signal(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    rules: RuleSet,
    required: Vec<IndicatorKey>,
}

impl Evaluator {
    pub fn new(rules: RuleSet) -> Result<Self> {
        rules.validate()?;
        let required = rules.required_keys();
        Ok(Self { rules, required })
    }

    pub fn evaluate(&self, snapshot: &IndicatorSnapshot, trend: Option<&TrendContext>) -> Evaluation {
        if let Some(missing) = snapshot.first_missing(&self.required) {
            return Evaluation::Unready { missing };
        }

        let fires = |preds: &[Predicate]| !preds.is_empty() && preds.iter().all(|p| p.holds(snapshot));
        let direction = match (fires(&self.rules.up), fires(&self.rules.down)) {
            (true, true) => {
                warn!(
                    strategy = %self.rules.name,
                    index = snapshot.index,
                    "Both directions satisfied, ignoring candle"
                );
                return Evaluation::Ambiguous;
            }
            (true, false) => Direction::Up,
            (false, true) => Direction::Down,
            (false, false) => return Evaluation::NoSignal,
        };

        let context = trend.copied().unwrap_or_default();
        if !context.permits(direction, self.rules.confluence) {
            debug!(
                strategy = %self.rules.name,
                index = snapshot.index,
                %direction,
                bias = ?context.bias,
                "Signal vetoed by trend context"
            );
            return Evaluation::Vetoed { direction };
        }

        Evaluation::Signal(Signal {
            index: snapshot.index,
            direction,
            snapshot: snapshot.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trend::TrendBias;
    use chrono::{TimeZone, Utc};

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            index: 42,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 42, 0).unwrap(),
            open: 100.0,
            close: 100.2,
            volume: 800.0,
            body: 0.2,
            upper_wick: 0.5,
            lower_wick: 0.05,
            ema_fast: None,
            ema_slow: None,
            ema_trend: None,
            rsi: Some(75.0),
            adx: Some(22.0),
            bb_mean: Some(99.0),
            bb_std: Some(0.5),
            bb_upper: Some(100.0),
            bb_lower: Some(98.0),
            bandwidth: Some(0.02),
            bandwidth_ma: Some(0.015),
            z_score: Some(2.4),
            tactical_prob: Some(0.7),
            strategic_prob: None,
            stoch_k: None,
            volume_ma: Some(1000.0),
        }
    }

    fn reversion_rules() -> RuleSet {
        RuleSet {
            name: "test".into(),
            down: vec![
                Predicate::TacticalProbAbove { threshold: 0.6 },
                Predicate::ZScoreAbove { threshold: 1.5 },
                Predicate::VolumeExhausted,
                Predicate::UpperWickRejection { ratio: 0.7 },
                Predicate::AdxBelow { threshold: 30.0 },
            ],
            up: vec![
                Predicate::TacticalProbBelow { threshold: 0.4 },
                Predicate::ZScoreBelow { threshold: -1.5 },
                Predicate::VolumeExhausted,
                Predicate::LowerWickRejection { ratio: 0.7 },
                Predicate::AdxBelow { threshold: 30.0 },
            ],
            confluence: Confluence::Ignore,
        }
    }

    #[test]
    fn all_predicates_hold_fires_down() {
        let eval = Evaluator::new(reversion_rules()).unwrap();
        let signal = eval.evaluate(&snapshot(), None).signal().unwrap();
        assert_eq!(signal.direction, Direction::Down);
        assert_eq!(signal.index, 42);
    }

    #[test]
    fn one_failing_predicate_blocks() {
        let eval = Evaluator::new(reversion_rules()).unwrap();
        let mut s = snapshot();
        s.adx = Some(31.0);
        assert_eq!(eval.evaluate(&s, None), Evaluation::NoSignal);
    }

    #[test]
    fn missing_indicator_is_unready() {
        let eval = Evaluator::new(reversion_rules()).unwrap();
        let mut s = snapshot();
        s.volume_ma = None;
        assert_eq!(
            eval.evaluate(&s, None),
            Evaluation::Unready { missing: IndicatorKey::VolumeMa }
        );
    }

    #[test]
    fn both_directions_is_ambiguous() {
        let rules = RuleSet {
            up: vec![Predicate::RsiAbove { threshold: 50.0 }],
            down: vec![Predicate::AdxBelow { threshold: 30.0 }],
            ..RuleSet::default()
        };
        let eval = Evaluator::new(rules).unwrap();
        assert_eq!(eval.evaluate(&snapshot(), None), Evaluation::Ambiguous);
    }

    #[test]
    fn confluence_agree_vetoes_opposite_and_missing_trend() {
        let mut rules = reversion_rules();
        rules.confluence = Confluence::Agree;
        let eval = Evaluator::new(rules).unwrap();

        let up = TrendContext { bias: TrendBias::Up, ..TrendContext::default() };
        let down = TrendContext { bias: TrendBias::Down, ..TrendContext::default() };

        assert_eq!(
            eval.evaluate(&snapshot(), Some(&up)),
            Evaluation::Vetoed { direction: Direction::Down }
        );
        assert_eq!(
            eval.evaluate(&snapshot(), None),
            Evaluation::Vetoed { direction: Direction::Down }
        );
        assert!(eval.evaluate(&snapshot(), Some(&down)).signal().is_some());
    }

    #[test]
    fn same_snapshot_same_verdict() {
        let eval = Evaluator::new(reversion_rules()).unwrap();
        let s = snapshot();
        assert_eq!(eval.evaluate(&s, None), eval.evaluate(&s, None));
    }

    #[test]
    fn required_keys_are_deduplicated() {
        let keys = reversion_rules().required_keys();
        assert_eq!(
            keys,
            vec![IndicatorKey::Adx, IndicatorKey::ZScore, IndicatorKey::TacticalProb, IndicatorKey::VolumeMa]
        );
    }

    #[test]
    fn empty_rule_set_rejected() {
        assert!(matches!(Evaluator::new(RuleSet::default()), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn predicates_parse_from_toml() {
        let rules: RuleSet = toml::from_str(
            r#"
            confluence = "not_contradict"
            up = [
                { kind = "rsi_below", threshold = 30.0 },
                { kind = "lower_wick_rejection", ratio = 0.6 },
                { kind = "bullish_candle" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(rules.confluence, Confluence::NotContradict);
        assert_eq!(rules.up[1], Predicate::LowerWickRejection { ratio: 0.6 });
        assert_eq!(rules.up[2], Predicate::BullishCandle);
        assert!(rules.down.is_empty());
    }
}
