use serde::Serialize;
use tracing::{debug, info};

use common::{Candle, Horizon, SettledTrade};
use performance::PerformanceSummary;
use strategy::{
    Error as StrategyError, Evaluation, Evaluator, IndicatorPipeline, StrategyDefinition,
    TrendContext,
};

use crate::lifecycle::{Admission, LifecycleConfig, TradeLifecycle};

/// Per-run counters of what happened at visited candles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BacktestStats {
    pub visited: usize,
    pub unready: usize,
    pub signals: usize,
    pub opened: usize,
    pub ambiguous: usize,
    pub vetoed: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub strategy: String,
    pub symbol: String,
    pub candles: usize,
    pub trades: Vec<SettledTrade>,
    pub summary: PerformanceSummary,
    pub stats: BacktestStats,
}

/// Sequential, synchronous replay of one strategy over a static candle series.
pub struct Backtester {
    name: String,
    symbol: String,
    pipeline: IndicatorPipeline,
    evaluator: Evaluator,
    lifecycle: LifecycleConfig,
    horizon: usize,
    cooldown: usize,
    include_forming: bool,
}

impl Backtester {
    pub fn new(def: &StrategyDefinition) -> Result<Self, StrategyError> {
        def.validate()?;
        let Horizon::Candles(horizon) = def.horizon else {
            return Err(StrategyError::InvalidConfig(format!(
                "strategy '{}' uses a wall-clock horizon; backtests need a candle horizon",
                def.name
            )));
        };
        Ok(Self {
            name: def.name.clone(),
            symbol: def.symbol.clone(),
            pipeline: def.pipeline()?,
            evaluator: def.evaluator()?,
            lifecycle: LifecycleConfig::from_definition(def),
            horizon,
            cooldown: def.cooldown(),
            include_forming: false,
        })
    }

    /// Also walk the last candle of the series, which is excluded by default
    /// because a freshly fetched series ends with a still-forming candle.
    pub fn include_forming_candle(mut self, include: bool) -> Self {
        self.include_forming = include;
        self
    }

    pub fn run(&self, candles: &[Candle], trend: Option<&TrendContext>) -> BacktestReport {
        let snapshots = self.pipeline.compute(candles);
        let mut lifecycle = TradeLifecycle::new(self.lifecycle);
        let mut trades = Vec::new();
        let mut stats = BacktestStats::default();

        let limit = if self.include_forming {
            candles.len()
        } else {
            candles.len().saturating_sub(1)
        };

        let mut i = 0;
        while i + self.horizon < limit {
            trades.extend(lifecycle.settle_due_at_index(i, candles));
            stats.visited += 1;

            let snapshot = &snapshots[i];
            let mut step = 1;
            match self.evaluator.evaluate(snapshot, trend) {
                Evaluation::Unready { missing } => {
                    stats.unready += 1;
                    debug!(index = i, %missing, "Candle not ready");
                }
                Evaluation::NoSignal => {}
                Evaluation::Ambiguous => stats.ambiguous += 1,
                Evaluation::Vetoed { .. } => {
                    stats.signals += 1;
                    stats.vetoed += 1;
                }
                Evaluation::Signal(signal) => {
                    stats.signals += 1;
                    match lifecycle.open(&signal, snapshot.close, snapshot.timestamp) {
                        Admission::Opened(_) => {
                            stats.opened += 1;
                            step = self.cooldown;
                        }
                        Admission::Rejected(_) => stats.rejected += 1,
                    }
                }
            }
            i += step;
        }

        // Every opened trade's deadline lies below `limit`
        if let Some(last) = limit.checked_sub(1) {
            trades.extend(lifecycle.settle_due_at_index(last, candles));
        }

        let summary = PerformanceSummary::from_trades(&trades, self.lifecycle.payout_ratio);
        info!(
            strategy = %self.name,
            symbol = %self.symbol,
            candles = candles.len(),
            trades = summary.total,
            hit_rate = summary.hit_rate,
            kelly = summary.kelly.fraction,
            "Backtest finished"
        );

        BacktestReport {
            strategy: self.name.clone(),
            symbol: self.symbol.clone(),
            candles: candles.len(),
            trades,
            summary,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::candles;
    use common::{Direction, PositionPolicy, TradeResult};
    use strategy::pipeline::{EmaPairConfig, VolumeConfig};
    use strategy::{IndicatorConfig, Predicate, RuleSet};

    /// EMA 2/4 and a 3-candle volume mean; UP whenever the fast EMA leads.
    fn fires_everywhere(policy: PositionPolicy, cooldown: Option<usize>) -> StrategyDefinition {
        StrategyDefinition {
            name: "always_up".into(),
            symbol: "TESTUSDT".into(),
            timeframe: common::Timeframe::M1,
            history: 100,
            indicators: IndicatorConfig {
                volume: Some(VolumeConfig { window: 3 }),
                ema: Some(EmaPairConfig { fast: 2, slow: 4 }),
                ..IndicatorConfig::default()
            },
            rules: RuleSet {
                name: "always_up".into(),
                up: vec![Predicate::EmaFastAboveSlow],
                ..RuleSet::default()
            },
            trend: None,
            horizon: Horizon::Candles(15),
            cooldown,
            positions: policy,
            payout_ratio: 0.85,
            diagnostics: Default::default(),
        }
    }

    fn rising(n: usize) -> Vec<Candle> {
        candles(&(0..n).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
    }

    #[test]
    fn cooldown_skips_to_settlement_candle() {
        let def = fires_everywhere(PositionPolicy::Single, None);
        let report = Backtester::new(&def).unwrap().run(&rising(60), None);
        let entries: Vec<usize> = report.trades.iter().filter_map(|t| t.entry_index).collect();
        // EMA fast > slow from index 1; each entry is 15 after the previous one
        assert_eq!(entries, vec![1, 16, 31]);
        assert!(report.trades.iter().all(|t| t.result == TradeResult::Win));
        assert_eq!(report.stats.rejected, 0);
    }

    #[test]
    fn forming_candle_is_excluded_by_default() {
        // 47 candles: limit 46, last visited index 30 (30 + 15 < 46 fails at 31)
        let def = fires_everywhere(PositionPolicy::Single, None);
        let report = Backtester::new(&def).unwrap().run(&rising(47), None);
        assert_eq!(report.trades.last().and_then(|t| t.entry_index), Some(16));

        let report = Backtester::new(&def)
            .unwrap()
            .include_forming_candle(true)
            .run(&rising(47), None);
        assert_eq!(report.trades.last().and_then(|t| t.entry_index), Some(31));
    }

    #[test]
    fn single_position_without_cooldown_rejects_overlap() {
        let def = fires_everywhere(PositionPolicy::Single, Some(1));
        let report = Backtester::new(&def).unwrap().run(&rising(40), None);
        assert_eq!(report.stats.opened, report.trades.len());
        assert!(report.stats.rejected > 0);
        // Entries at 1 and 16; 16 is allowed because the first trade settles there
        let entries: Vec<usize> = report.trades.iter().filter_map(|t| t.entry_index).collect();
        assert_eq!(entries, vec![1, 16]);
    }

    #[test]
    fn multi_position_overlaps_trades() {
        let def = fires_everywhere(PositionPolicy::Multi { max_open: 16 }, Some(1));
        let report = Backtester::new(&def).unwrap().run(&rising(40), None);
        // Every index from 1 while i + 15 < 39
        assert_eq!(report.trades.len(), 23);
        assert_eq!(report.stats.rejected, 0);
        assert!(report.trades.iter().all(|t| t.direction == Direction::Up));
    }

    #[test]
    fn rules_on_uncomputed_columns_are_rejected() {
        let mut def = fires_everywhere(PositionPolicy::Single, None);
        def.rules.up = vec![Predicate::BandwidthExpanding];
        assert!(Backtester::new(&def).is_err());
    }

    #[test]
    fn short_series_yields_empty_report() {
        let def = fires_everywhere(PositionPolicy::Single, None);
        let report = Backtester::new(&def).unwrap().run(&rising(10), None);
        assert!(report.trades.is_empty());
        assert_eq!(report.summary.hit_rate, 0.0);
        assert_eq!(report.stats.visited, 0);
    }

    #[test]
    fn wall_clock_horizon_is_rejected() {
        let mut def = fires_everywhere(PositionPolicy::Single, None);
        def.horizon = Horizon::WallClock(std::time::Duration::from_secs(900));
        assert!(matches!(Backtester::new(&def), Err(StrategyError::InvalidConfig(_))));
    }

    #[test]
    fn ambiguous_candles_open_nothing() {
        let mut def = fires_everywhere(PositionPolicy::Single, None);
        def.rules.down = vec![Predicate::EmaFastAboveSlow];
        let report = Backtester::new(&def).unwrap().run(&rising(40), None);
        // Index 0 has fast == slow, every later candle matches both sides
        assert_eq!(report.stats.ambiguous, report.stats.visited - 1);
        assert_eq!(report.stats.signals, 0);
        assert_eq!(report.stats.opened, 0);
        assert!(report.trades.is_empty());
    }

    #[test]
    fn warmup_rows_are_unready() {
        let mut def = fires_everywhere(PositionPolicy::Single, None);
        def.rules.up = vec![Predicate::EmaFastAboveSlow, Predicate::VolumeExhausted];
        let mut series = rising(40);
        for (i, c) in series.iter_mut().enumerate() {
            c.volume = if i % 2 == 0 { 500.0 } else { 1500.0 };
        }
        let report = Backtester::new(&def).unwrap().run(&series, None);
        // Volume mean over 3 is undefined at indices 0 and 1
        assert_eq!(report.stats.unready, 2);
    }
}
