//! Indicator kernels.
//!
//! Every kernel returns one value per input candle, aligned by index, as
//! `Option<f64>`: `None` marks the warm-up region and any row where the
//! arithmetic is degenerate (zero denominators). Values are never defaulted.

pub mod adx;
pub mod bollinger;
pub mod drift;
pub mod ema;
pub mod rsi;
pub mod stochastic;
pub mod volume;

pub use adx::{AdxIndicator, AdxMethod};
pub use bollinger::{BollingerIndicator, BollingerSeries};
pub use drift::{standard_normal_cdf, DriftIndicator};
pub use ema::{ema, EmaIndicator};
pub use rsi::{RsiIndicator, RsiSmoothing};
pub use stochastic::StochasticIndicator;
pub use volume::VolumeIndicator;

/// Relative tolerance under which a standard deviation is treated as zero.
pub(crate) const DEGENERATE_STD: f64 = 1e-12;

pub(crate) fn defined(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|v| v.is_finite().then_some(*v)).collect()
}

/// Rolling sum; `None` wherever the window is incomplete or contains `None`.
pub(crate) fn rolling_sum(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().sum())
}

/// Rolling arithmetic mean.
pub(crate) fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Rolling sample standard deviation (n − 1 denominator). Needs `window >= 2`.
pub(crate) fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window < 2 {
        return vec![None; values.len()];
    }
    rolling(values, window, |w| {
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let var = w.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (w.len() - 1) as f64;
        var.max(0.0).sqrt()
    })
}

pub(crate) fn rolling_min(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub(crate) fn rolling_max(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

fn rolling<F>(values: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    let n = values.len();
    let mut out = vec![None; n];
    if window == 0 || n < window {
        return out;
    }
    let mut buf = Vec::with_capacity(window);
    for end in (window - 1)..n {
        buf.clear();
        for v in &values[end + 1 - window..=end] {
            match v {
                Some(x) => buf.push(*x),
                None => break,
            }
        }
        if buf.len() == window {
            out[end] = Some(f(&buf));
        }
    }
    out
}

/// Recursive exponential smoothing (`adjust = false`): seeded with the first
/// defined value, rows with `None` input yield `None` and leave the state
/// untouched.
pub(crate) fn smooth_recursive(values: &[Option<f64>], alpha: f64) -> Vec<Option<f64>> {
    let mut state: Option<f64> = None;
    values
        .iter()
        .map(|v| {
            let x = (*v)?;
            let next = match state {
                None => x,
                Some(prev) => alpha * x + (1.0 - alpha) * prev,
            };
            state = Some(next);
            Some(next)
        })
        .collect()
}

/// Bias-corrected exponential weighting (`adjust = true`): each output is the
/// weighted mean of all prior defined inputs with weights `(1 − alpha)^age`.
/// Missing inputs still age the weights.
pub(crate) fn smooth_adjusted(values: &[Option<f64>], alpha: f64) -> Vec<Option<f64>> {
    let decay = 1.0 - alpha;
    let mut num = 0.0;
    let mut den = 0.0;
    values
        .iter()
        .map(|v| {
            num *= decay;
            den *= decay;
            let x = (*v)?;
            num += x;
            den += 1.0;
            Some(num / den)
        })
        .collect()
}

/// Clear the first `rows` entries (warm-up mask).
pub(crate) fn mask_warmup(values: &mut [Option<f64>], rows: usize) {
    for v in values.iter_mut().take(rows) {
        *v = None;
    }
}

/// Synthetic candles from close prices for tests.
///
/// open = previous close (or close for the first candle),
/// high = max(open, close) + 1.0, low = min(open, close) − 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<common::Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            common::Candle {
                timestamp: base + Duration::minutes(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}
