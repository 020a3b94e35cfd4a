use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use common::{
    Candle, DiagnosticCategory, DiagnosticConfig, Direction, Horizon, PositionPolicy,
    SettledTrade, TradeResult, TradeStatus, DEFAULT_PAYOUT_RATIO,
};
use strategy::{Signal, StrategyDefinition};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifecycleConfig {
    pub policy: PositionPolicy,
    pub horizon: Horizon,
    /// Return on a winning unit stake.
    pub payout_ratio: f64,
    pub diagnostics: DiagnosticConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            policy: PositionPolicy::Single,
            horizon: Horizon::default(),
            payout_ratio: DEFAULT_PAYOUT_RATIO,
            diagnostics: DiagnosticConfig::default(),
        }
    }
}

impl LifecycleConfig {
    pub fn from_definition(def: &StrategyDefinition) -> Self {
        Self {
            policy: def.positions,
            horizon: def.horizon,
            payout_ratio: def.payout_ratio,
            diagnostics: def.diagnostics,
        }
    }
}

/// When an open trade becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Settles on the close of this candle index.
    Index(usize),
    /// Settles at the first observation at or after this instant.
    Time(DateTime<Utc>),
}

/// A trade held by the lifecycle manager. It leaves the manager only as a
/// [`SettledTrade`].
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: Uuid,
    pub signal_index: usize,
    pub entry_time: DateTime<Utc>,
    pub direction: Direction,
    pub entry_price: f64,
    pub deadline: Deadline,
}

impl Trade {
    pub fn status(&self) -> TradeStatus {
        TradeStatus::Open
    }

    fn settle(self, exit_price: f64, exit_time: DateTime<Utc>, config: &LifecycleConfig) -> SettledTrade {
        let result = settlement_result(self.direction, self.entry_price, exit_price);
        let pnl = match result {
            TradeResult::Win => config.payout_ratio,
            TradeResult::Loss => -1.0,
        };
        SettledTrade {
            id: self.id,
            direction: self.direction,
            entry_index: Some(self.signal_index),
            entry_time: self.entry_time,
            entry_price: self.entry_price,
            exit_time,
            exit_price,
            result,
            pnl,
            diagnostic: diagnose(result, self.entry_price, exit_price, &config.diagnostics),
        }
    }
}

/// WIN iff UP and exit > entry, or DOWN and exit < entry. Ties lose.
pub fn settlement_result(direction: Direction, entry: f64, exit: f64) -> TradeResult {
    let won = match direction {
        Direction::Up => exit > entry,
        Direction::Down => exit < entry,
    };
    if won {
        TradeResult::Win
    } else {
        TradeResult::Loss
    }
}

/// Coarse post-hoc attribution. A loss whose move exceeds
/// `breakout_fraction · entry` broke through; smaller losses drifted.
pub fn diagnose(result: TradeResult, entry: f64, exit: f64, config: &DiagnosticConfig) -> DiagnosticCategory {
    match result {
        TradeResult::Win => DiagnosticCategory::Reverted,
        TradeResult::Loss if (exit - entry).abs() > entry.abs() * config.breakout_fraction => {
            DiagnosticCategory::BrokeThrough
        }
        TradeResult::Loss => DiagnosticCategory::Drifted,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Single-position mode with a trade already open.
    PositionBusy,
    /// Multi-position mode at `max_open`.
    CapacityReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Opened(Uuid),
    Rejected(Rejection),
}

/// Owns the active trade set. All mutation goes through `open` and the
/// `settle_*` methods, so a trade is settled exactly once.
#[derive(Debug, Clone)]
pub struct TradeLifecycle {
    config: LifecycleConfig,
    active: Vec<Trade>,
}

impl TradeLifecycle {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            active: Vec::new(),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn active(&self) -> &[Trade] {
        &self.active
    }

    pub fn has_capacity(&self) -> bool {
        self.active.len() < self.config.policy.capacity()
    }

    pub fn open(&mut self, signal: &Signal, entry_price: f64, entry_time: DateTime<Utc>) -> Admission {
        if !self.has_capacity() {
            let reason = match self.config.policy {
                PositionPolicy::Single => Rejection::PositionBusy,
                PositionPolicy::Multi { .. } => Rejection::CapacityReached,
            };
            debug!(index = signal.index, direction = %signal.direction, ?reason, "Signal rejected");
            return Admission::Rejected(reason);
        }

        let deadline = match self.config.horizon {
            Horizon::Candles(n) => Deadline::Index(signal.index + n),
            Horizon::WallClock(d) => Deadline::Time(
                chrono::Duration::from_std(d)
                    .ok()
                    .and_then(|span| entry_time.checked_add_signed(span))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
        };
        let trade = Trade {
            id: Uuid::new_v4(),
            signal_index: signal.index,
            entry_time,
            direction: signal.direction,
            entry_price,
            deadline,
        };
        info!(
            id = %trade.id,
            index = trade.signal_index,
            direction = %trade.direction,
            entry = trade.entry_price,
            deadline = ?trade.deadline,
            "Trade opened"
        );
        let id = trade.id;
        self.active.push(trade);
        Admission::Opened(id)
    }

    /// Settle every index-deadline trade due at or before `index`, each on
    /// the close of its own deadline candle. Trades whose deadline candle is
    /// not in `candles` stay open.
    pub fn settle_due_at_index(&mut self, index: usize, candles: &[Candle]) -> Vec<SettledTrade> {
        let due = |t: &Trade| matches!(t.deadline, Deadline::Index(d) if d <= index && d < candles.len());
        self.take_due(due, |t| match t.deadline {
            Deadline::Index(d) => (candles[d].close, candles[d].timestamp),
            Deadline::Time(at) => (t.entry_price, at),
        })
    }

    /// Whether any wall-clock trade is due at `now`.
    pub fn has_due_at_time(&self, now: DateTime<Utc>) -> bool {
        self.active
            .iter()
            .any(|t| matches!(t.deadline, Deadline::Time(at) if at <= now))
    }

    /// Settle every wall-clock trade whose deadline is at or before `now`, at
    /// the observed `price`.
    pub fn settle_due_at_time(&mut self, now: DateTime<Utc>, price: f64) -> Vec<SettledTrade> {
        let due = |t: &Trade| matches!(t.deadline, Deadline::Time(at) if at <= now);
        self.take_due(due, |_| (price, now))
    }

    fn take_due<D, P>(&mut self, is_due: D, exit: P) -> Vec<SettledTrade>
    where
        D: Fn(&Trade) -> bool,
        P: Fn(&Trade) -> (f64, DateTime<Utc>),
    {
        let (due, keep): (Vec<Trade>, Vec<Trade>) =
            std::mem::take(&mut self.active).into_iter().partition(|t| is_due(t));
        self.active = keep;

        due.into_iter()
            .map(|trade| {
                let (price, at) = exit(&trade);
                let settled = trade.settle(price, at, &self.config);
                info!(
                    id = %settled.id,
                    direction = %settled.direction,
                    entry = settled.entry_price,
                    exit = settled.exit_price,
                    result = %settled.result,
                    pnl = settled.pnl,
                    diagnostic = %settled.diagnostic,
                    "Trade settled"
                );
                settled
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use strategy::IndicatorSnapshot;

    pub(crate) fn candles(closes: &[f64]) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                timestamp: base + Duration::minutes(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1000.0,
            })
            .collect()
    }

    pub(crate) fn signal(index: usize, direction: Direction, close: f64) -> Signal {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::minutes(index as i64);
        Signal {
            index,
            direction,
            snapshot: IndicatorSnapshot {
                index,
                timestamp: ts,
                open: close,
                close,
                volume: 1000.0,
                body: 0.0,
                upper_wick: 1.0,
                lower_wick: 1.0,
                ema_fast: None,
                ema_slow: None,
                ema_trend: None,
                rsi: None,
                adx: None,
                bb_mean: None,
                bb_std: None,
                bb_upper: None,
                bb_lower: None,
                bandwidth: None,
                bandwidth_ma: None,
                z_score: None,
                tactical_prob: None,
                strategic_prob: None,
                stoch_k: None,
                volume_ma: None,
            },
        }
    }

    fn lifecycle(policy: PositionPolicy, horizon: Horizon) -> TradeLifecycle {
        TradeLifecycle::new(LifecycleConfig {
            policy,
            horizon,
            ..LifecycleConfig::default()
        })
    }

    #[test]
    fn up_above_entry_wins_down_above_entry_loses() {
        assert_eq!(settlement_result(Direction::Up, 100.0, 101.0), TradeResult::Win);
        assert_eq!(settlement_result(Direction::Down, 100.0, 101.0), TradeResult::Loss);
        assert_eq!(settlement_result(Direction::Down, 100.0, 99.0), TradeResult::Win);
    }

    #[test]
    fn tie_is_a_loss() {
        assert_eq!(settlement_result(Direction::Up, 100.0, 100.0), TradeResult::Loss);
        assert_eq!(settlement_result(Direction::Down, 100.0, 100.0), TradeResult::Loss);
    }

    #[test]
    fn diagnostics_split_losses_by_move_size() {
        let cfg = DiagnosticConfig::default();
        assert_eq!(diagnose(TradeResult::Win, 100.0, 101.0, &cfg), DiagnosticCategory::Reverted);
        assert_eq!(diagnose(TradeResult::Loss, 100.0, 100.5, &cfg), DiagnosticCategory::BrokeThrough);
        assert_eq!(diagnose(TradeResult::Loss, 100.0, 100.05, &cfg), DiagnosticCategory::Drifted);
    }

    #[test]
    fn single_position_rejects_second_signal() {
        let mut lc = lifecycle(PositionPolicy::Single, Horizon::Candles(15));
        let t0 = Utc::now();
        assert!(matches!(lc.open(&signal(10, Direction::Up, 100.0), 100.0, t0), Admission::Opened(_)));
        assert_eq!(
            lc.open(&signal(11, Direction::Down, 100.0), 100.0, t0),
            Admission::Rejected(Rejection::PositionBusy)
        );
        assert_eq!(lc.active().len(), 1);
        assert_eq!(lc.active()[0].status(), TradeStatus::Open);
    }

    #[test]
    fn multi_position_caps_active_set() {
        let mut lc = lifecycle(PositionPolicy::Multi { max_open: 2 }, Horizon::Candles(5));
        let t0 = Utc::now();
        for i in 0..2 {
            assert!(matches!(lc.open(&signal(i, Direction::Up, 100.0), 100.0, t0), Admission::Opened(_)));
        }
        assert_eq!(
            lc.open(&signal(2, Direction::Up, 100.0), 100.0, t0),
            Admission::Rejected(Rejection::CapacityReached)
        );
    }

    #[test]
    fn index_settlement_uses_deadline_close() {
        let series = candles(&[100.0, 100.0, 100.0, 101.0, 99.0, 98.0]);
        let mut lc = lifecycle(PositionPolicy::Multi { max_open: 4 }, Horizon::Candles(3));
        let t0 = series[0].timestamp;
        lc.open(&signal(0, Direction::Up, 100.0), 100.0, t0);
        lc.open(&signal(1, Direction::Up, 100.0), 100.0, t0);

        assert!(lc.settle_due_at_index(2, &series).is_empty());

        // Both deadlines (3 and 4) are due by index 5; each uses its own close
        let settled = lc.settle_due_at_index(5, &series);
        assert_eq!(settled.len(), 2);
        assert_eq!(settled[0].exit_price, 101.0);
        assert_eq!(settled[0].result, TradeResult::Win);
        assert_eq!(settled[0].pnl, 0.85);
        assert_eq!(settled[1].exit_price, 99.0);
        assert_eq!(settled[1].result, TradeResult::Loss);
        assert_eq!(settled[1].pnl, -1.0);
        assert!(lc.active().is_empty());

        // Settled trades are gone for good
        assert!(lc.settle_due_at_index(5, &series).is_empty());
    }

    #[test]
    fn deadline_past_series_end_stays_open() {
        let series = candles(&[100.0, 101.0]);
        let mut lc = lifecycle(PositionPolicy::Single, Horizon::Candles(15));
        lc.open(&signal(0, Direction::Up, 100.0), 100.0, series[0].timestamp);
        assert!(lc.settle_due_at_index(100, &series).is_empty());
        assert_eq!(lc.active().len(), 1);
    }

    #[test]
    fn wall_clock_settlement() {
        let mut lc = lifecycle(PositionPolicy::Single, Horizon::WallClock(std::time::Duration::from_secs(900)));
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        lc.open(&signal(99, Direction::Down, 3000.0), 3000.0, t0);

        assert!(!lc.has_due_at_time(t0 + Duration::minutes(14)));
        assert!(lc.settle_due_at_time(t0 + Duration::minutes(14), 2990.0).is_empty());
        assert!(!lc.has_capacity());
        assert!(lc.has_due_at_time(t0 + Duration::minutes(15)));

        let at = t0 + Duration::minutes(15);
        let settled = lc.settle_due_at_time(at, 2990.0);
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].result, TradeResult::Win);
        assert_eq!(settled[0].exit_time, at);
        assert!(lc.has_capacity());
    }
}
