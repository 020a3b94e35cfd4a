use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Return on a winning unit stake in every observed variant (85% payout).
pub const DEFAULT_PAYOUT_RATIO: f64 = 0.85;

/// Loss attribution threshold as a fraction of entry price (0.1%).
pub const DEFAULT_BREAKOUT_FRACTION: f64 = 0.001;

/// How many trades may be open at once.
///
/// TOML: `positions = { mode = "single" }` or
/// `positions = { mode = "multi", max_open = 3 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PositionPolicy {
    /// Signals are rejected while any trade is open.
    #[default]
    Single,
    /// Independent trades up to `max_open`, each timed on its own.
    Multi { max_open: usize },
}

impl PositionPolicy {
    pub fn capacity(&self) -> usize {
        match self {
            PositionPolicy::Single => 1,
            PositionPolicy::Multi { max_open } => *max_open,
        }
    }
}

/// Forward distance after which an open trade settles.
///
/// TOML: `horizon = { candles = 15 }` or `horizon = { seconds = 900 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HorizonRepr", into = "HorizonRepr")]
pub enum Horizon {
    Candles(usize),
    WallClock(Duration),
}

impl Default for Horizon {
    fn default() -> Self {
        Horizon::Candles(15)
    }
}

impl Horizon {
    pub fn candles(&self) -> Option<usize> {
        match self {
            Horizon::Candles(n) => Some(*n),
            Horizon::WallClock(_) => None,
        }
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Horizon::Candles(n) => write!(f, "{n} candles"),
            Horizon::WallClock(d) => write!(f, "{}s", d.as_secs()),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum HorizonRepr {
    Candles(usize),
    Seconds(u64),
}

impl From<HorizonRepr> for Horizon {
    fn from(repr: HorizonRepr) -> Self {
        match repr {
            HorizonRepr::Candles(n) => Horizon::Candles(n),
            HorizonRepr::Seconds(s) => Horizon::WallClock(Duration::from_secs(s)),
        }
    }
}

impl From<Horizon> for HorizonRepr {
    fn from(h: Horizon) -> Self {
        match h {
            Horizon::Candles(n) => HorizonRepr::Candles(n),
            Horizon::WallClock(d) => HorizonRepr::Seconds(d.as_secs()),
        }
    }
}

/// Settings of the post-hoc loss categorizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticConfig {
    /// A losing move larger than this fraction of entry counts as a breakout.
    #[serde(default = "default_breakout_fraction")]
    pub breakout_fraction: f64,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            breakout_fraction: DEFAULT_BREAKOUT_FRACTION,
        }
    }
}

fn default_breakout_fraction() -> f64 {
    DEFAULT_BREAKOUT_FRACTION
}
