//! Scoring of settled trades: hit rate, diagnostic tally, PnL and a Kelly
//! sizing estimate.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use common::{DiagnosticCategory, SettledTrade};

/// `K = W − (1 − W) / R` for hit rate `W` and payout ratio `R`.
pub fn kelly_fraction(win_rate: f64, payout_ratio: f64) -> f64 {
    win_rate - (1.0 - win_rate) / payout_ratio
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// `K > 0`: the strategy may be sized.
    Positive,
    /// `K ≤ 0`: do not size this strategy.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Kelly {
    pub fraction: f64,
    pub edge: Edge,
}

impl Kelly {
    pub fn new(win_rate: f64, payout_ratio: f64) -> Self {
        let fraction = kelly_fraction(win_rate, payout_ratio);
        let edge = if fraction > 0.0 { Edge::Positive } else { Edge::None };
        Self { fraction, edge }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryTally {
    pub count: usize,
    /// Share of all settled trades.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    /// `wins / total`, 0 when there are no trades.
    pub hit_rate: f64,
    pub diagnostics: BTreeMap<DiagnosticCategory, CategoryTally>,
    pub total_pnl: f64,
    pub payout_ratio: f64,
    pub kelly: Kelly,
}

impl PerformanceSummary {
    pub fn from_trades(trades: &[SettledTrade], payout_ratio: f64) -> Self {
        let total = trades.len();
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let hit_rate = if total == 0 { 0.0 } else { wins as f64 / total as f64 };

        let mut counts: BTreeMap<DiagnosticCategory, usize> = BTreeMap::new();
        for t in trades {
            *counts.entry(t.diagnostic).or_default() += 1;
        }
        let diagnostics = counts
            .into_iter()
            .map(|(category, count)| {
                let share = count as f64 / total as f64;
                (category, CategoryTally { count, share })
            })
            .collect();

        Self {
            total,
            wins,
            losses: total - wins,
            hit_rate,
            diagnostics,
            total_pnl: trades.iter().map(|t| t.pnl).sum(),
            payout_ratio,
            kelly: Kelly::new(hit_rate, payout_ratio),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl fmt::Display for PerformanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(40);
        writeln!(f, "{rule}")?;
        if self.is_empty() {
            writeln!(f, "No trades settled.")?;
            return write!(f, "{rule}");
        }
        writeln!(f, "Total trades : {}", self.total)?;
        writeln!(f, "Wins / losses: {} / {}", self.wins, self.losses)?;
        writeln!(f, "Hit rate     : {:.2}%", self.hit_rate * 100.0)?;
        writeln!(f, "Total PnL    : {:+.2} units", self.total_pnl)?;
        let verdict = match self.kelly.edge {
            Edge::Positive => "positive edge",
            Edge::None => "do not size",
        };
        writeln!(
            f,
            "Kelly (R={:.2}): {:.2}% ({verdict})",
            self.payout_ratio,
            self.kelly.fraction * 100.0
        )?;
        writeln!(f, "Diagnostics:")?;
        for (category, tally) in &self.diagnostics {
            writeln!(
                f,
                "  {:<14} {:>4} ({:.1}%)  {}",
                category.to_string(),
                tally.count,
                tally.share * 100.0,
                category.label()
            )?;
        }
        write!(f, "{rule}")
    }
}
