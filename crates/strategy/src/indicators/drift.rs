use statrs::function::erf::erfc;

use super::{rolling_mean, rolling_std, DEGENERATE_STD};

/// Probability that log-returns drift upward over a forecast horizon.
///
/// With μ and σ the rolling mean and sample standard deviation of log-returns
/// over `window`, the value is `Φ(μ·T / (σ·√T))` for horizon `T`. Returns are
/// assumed i.i.d. Gaussian over the horizon; this is a modelling
/// simplification kept for reproducibility.
///
/// Needs `window` returns, so the first defined row is index `window`.
#[derive(Debug, Clone)]
pub struct DriftIndicator {
    pub window: usize,
    pub horizon: usize,
}

impl DriftIndicator {
    pub fn new(window: usize, horizon: usize) -> Self {
        assert!(window >= 2, "drift window must be >= 2");
        assert!(horizon >= 1, "drift horizon must be >= 1");
        Self { window, horizon }
    }

    pub fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let returns = log_returns(closes);
        let mu = rolling_mean(&returns, self.window);
        let sigma = rolling_std(&returns, self.window);
        let t = self.horizon as f64;

        mu.iter()
            .zip(&sigma)
            .map(|(m, s)| {
                let (m, s) = ((*m)?, (*s)?);
                if s <= DEGENERATE_STD {
                    return None;
                }
                Some(standard_normal_cdf((m * t) / (s * t.sqrt())))
            })
            .collect()
    }
}

/// `ln(c[i] / c[i-1])`; undefined for the first close and non-positive prices.
pub fn log_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    for i in 1..closes.len() {
        let (prev, curr) = (closes[i - 1], closes[i]);
        if prev > 0.0 && curr > 0.0 {
            let r = (curr / prev).ln();
            out[i] = r.is_finite().then_some(r);
        }
    }
    out
}

/// Φ(x), the standard normal cumulative distribution function.
pub fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}
