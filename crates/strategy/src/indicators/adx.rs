//! ADX: Average Directional Index.
//!
//! True range is `max(high - low, |high - prev_close|, |low - prev_close|)` for
//! every method. The three methods produce materially different series from
//! the same candles, so the method is part of the configuration:
//!
//! - `Wilder`: +DM/-DM with mutual exclusion, TR and DM smoothed with
//!   `alpha = 1/period`, ADX = smoothed DX. Lookback `2 * period - 1`.
//! - `RollingSum`: +DM = max(Δhigh, 0), -DM = max(-Δlow, 0), DI from rolling
//!   sums over `period`, ADX = rolling mean of DX. Lookback `2 * period - 1`.
//! - `SingleCandle`: DX = 100 * |Δhigh - Δlow| / TR for each candle alone
//!   (saturating at 100), ADX = bias-corrected EWM with `span = period`.
//!   Far noisier. Lookback `period`.
//!
//! A zero true range or zero DI sum leaves that candle's DX undefined.

use serde::{Deserialize, Serialize};

use common::Candle;

use super::{mask_warmup, rolling_mean, rolling_sum, smooth_adjusted, smooth_recursive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdxMethod {
    #[default]
    Wilder,
    RollingSum,
    SingleCandle,
}

#[derive(Debug, Clone)]
pub struct AdxIndicator {
    pub period: usize,
    pub method: AdxMethod,
}

impl AdxIndicator {
    pub fn new(period: usize, method: AdxMethod) -> Self {
        assert!(period >= 2, "ADX period must be >= 2");
        Self { period, method }
    }

    /// Number of leading rows that are always undefined.
    pub fn lookback(&self) -> usize {
        match self.method {
            AdxMethod::Wilder | AdxMethod::RollingSum => 2 * self.period - 1,
            AdxMethod::SingleCandle => self.period,
        }
    }

    pub fn compute(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let mut adx = match self.method {
            AdxMethod::Wilder => self.wilder(candles),
            AdxMethod::RollingSum => self.rolling_sum(candles),
            AdxMethod::SingleCandle => self.single_candle(candles),
        };
        mask_warmup(&mut adx, self.lookback());
        adx.into_iter()
            .map(|v| v.map(|x| x.clamp(0.0, 100.0)))
            .collect()
    }

    /// Smoothing is seeded on the first candle with `TR = high − low` and no
    /// directional movement.
    fn wilder(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let n = candles.len();
        let mut tr = true_range(candles);
        let mut plus_dm = vec![None; n];
        let mut minus_dm = vec![None; n];
        if let Some(first) = candles.first() {
            let range = first.high - first.low;
            tr[0] = range.is_finite().then_some(range);
            plus_dm[0] = Some(0.0);
            minus_dm[0] = Some(0.0);
        }
        for i in 1..n {
            let up = candles[i].high - candles[i - 1].high;
            let down = candles[i - 1].low - candles[i].low;
            plus_dm[i] = Some(if up > down && up > 0.0 { up } else { 0.0 });
            minus_dm[i] = Some(if down > up && down > 0.0 { down } else { 0.0 });
        }

        let alpha = 1.0 / self.period as f64;
        let tr_s = smooth_recursive(&tr, alpha);
        let plus_s = smooth_recursive(&plus_dm, alpha);
        let minus_s = smooth_recursive(&minus_dm, alpha);

        let dx: Vec<Option<f64>> = (0..n)
            .map(|i| directional_index(plus_s[i]?, minus_s[i]?, tr_s[i]?))
            .collect();
        smooth_recursive(&dx, alpha)
    }

    fn rolling_sum(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let n = candles.len();
        let tr = true_range(candles);
        let mut plus_dm = vec![None; n];
        let mut minus_dm = vec![None; n];
        for i in 1..n {
            plus_dm[i] = Some((candles[i].high - candles[i - 1].high).max(0.0));
            minus_dm[i] = Some((candles[i - 1].low - candles[i].low).max(0.0));
        }

        let tr_sum = rolling_sum(&tr, self.period);
        let plus_sum = rolling_sum(&plus_dm, self.period);
        let minus_sum = rolling_sum(&minus_dm, self.period);

        let dx: Vec<Option<f64>> = (0..n)
            .map(|i| directional_index(plus_sum[i]?, minus_sum[i]?, tr_sum[i]?))
            .collect();
        rolling_mean(&dx, self.period)
    }

    fn single_candle(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let tr = true_range(candles);
        let dx: Vec<Option<f64>> = (0..candles.len())
            .map(|i| {
                let range = tr[i]?;
                if range <= 0.0 {
                    return None;
                }
                let high_diff = candles[i].high - candles[i - 1].high;
                let low_diff = candles[i].low - candles[i - 1].low;
                Some((100.0 * (high_diff - low_diff).abs() / range).min(100.0))
            })
            .collect();
        let alpha = 2.0 / (self.period as f64 + 1.0);
        smooth_adjusted(&dx, alpha)
    }
}

/// True range per candle; the first candle has no previous close.
pub fn true_range(candles: &[Candle]) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    for i in 1..candles.len() {
        let c = &candles[i];
        let prev_close = candles[i - 1].close;
        let tr = (c.high - c.low)
            .max((c.high - prev_close).abs())
            .max((c.low - prev_close).abs());
        out[i] = tr.is_finite().then_some(tr);
    }
    out
}

fn directional_index(plus: f64, minus: f64, range: f64) -> Option<f64> {
    if range <= 0.0 {
        return None;
    }
    let plus_di = 100.0 * plus / range;
    let minus_di = 100.0 * minus / range;
    let di_sum = plus_di + minus_di;
    if di_sum <= 0.0 {
        return None;
    }
    Some(100.0 * (plus_di - minus_di).abs() / di_sum)
}
