use chrono::Utc;
use proptest::prelude::*;

use common::{DiagnosticCategory, Direction, SettledTrade, TradeResult};
use performance::{kelly_fraction, PerformanceSummary};

fn settled(win: bool) -> SettledTrade {
    let now = Utc::now();
    SettledTrade {
        id: uuid::Uuid::new_v4(),
        direction: Direction::Down,
        entry_index: None,
        entry_time: now,
        entry_price: 50.0,
        exit_time: now,
        exit_price: if win { 49.0 } else { 51.0 },
        result: if win { TradeResult::Win } else { TradeResult::Loss },
        pnl: if win { 0.85 } else { -1.0 },
        diagnostic: if win { DiagnosticCategory::Reverted } else { DiagnosticCategory::BrokeThrough },
    }
}

proptest! {
    /// Hit rate is wins / total and stays in [0, 1]; category shares sum to 1.
    #[test]
    fn summary_is_consistent(outcomes in prop::collection::vec(any::<bool>(), 0..200)) {
        let trades: Vec<SettledTrade> = outcomes.iter().map(|w| settled(*w)).collect();
        let s = PerformanceSummary::from_trades(&trades, 0.85);

        prop_assert_eq!(s.total, outcomes.len());
        prop_assert_eq!(s.wins + s.losses, s.total);
        prop_assert!((0.0..=1.0).contains(&s.hit_rate));
        if s.total > 0 {
            let shares: f64 = s.diagnostics.values().map(|t| t.share).sum();
            prop_assert!((shares - 1.0).abs() < 1e-9);
        }
        prop_assert!((s.kelly.fraction - kelly_fraction(s.hit_rate, 0.85)).abs() < 1e-12);
    }

    /// Kelly never exceeds the hit rate and grows with it.
    #[test]
    fn kelly_is_monotone(w1 in 0.0f64..=1.0, w2 in 0.0f64..=1.0, r in 0.1f64..5.0) {
        let (lo, hi) = if w1 <= w2 { (w1, w2) } else { (w2, w1) };
        prop_assert!(kelly_fraction(lo, r) <= kelly_fraction(hi, r) + 1e-12);
        prop_assert!(kelly_fraction(hi, r) <= hi + 1e-12);
    }
}
