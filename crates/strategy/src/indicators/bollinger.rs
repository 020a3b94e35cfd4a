use super::{defined, rolling_mean, rolling_std, DEGENERATE_STD};

/// Bollinger bands over closes: rolling mean ± k·σ (sample σ), the bandwidth
/// ratio `(upper - lower) / mean`, an optional rolling mean of that ratio, and
/// the z-score `(close - mean) / σ`.
#[derive(Debug, Clone)]
pub struct BollingerIndicator {
    pub window: usize,
    pub k: f64,
    /// Window of the bandwidth moving average; `None` skips it.
    pub bandwidth_window: Option<usize>,
}

/// Column-wise output of [`BollingerIndicator::compute`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BollingerSeries {
    pub mean: Vec<Option<f64>>,
    pub std: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub bandwidth: Vec<Option<f64>>,
    pub bandwidth_ma: Vec<Option<f64>>,
    pub z_score: Vec<Option<f64>>,
}

impl BollingerIndicator {
    pub fn new(window: usize, k: f64, bandwidth_window: Option<usize>) -> Self {
        assert!(window >= 2, "Bollinger window must be >= 2");
        Self { window, k, bandwidth_window }
    }

    pub fn compute(&self, closes: &[f64]) -> BollingerSeries {
        let n = closes.len();
        let values = defined(closes);
        let mean = rolling_mean(&values, self.window);
        let std = rolling_std(&values, self.window);

        let mut upper = vec![None; n];
        let mut lower = vec![None; n];
        let mut bandwidth = vec![None; n];
        let mut z_score = vec![None; n];

        for i in 0..n {
            let (Some(m), Some(s)) = (mean[i], std[i]) else {
                continue;
            };
            let up = m + self.k * s;
            let lo = m - self.k * s;
            upper[i] = Some(up);
            lower[i] = Some(lo);
            if m != 0.0 {
                bandwidth[i] = Some((up - lo) / m);
            }
            if s > DEGENERATE_STD * m.abs().max(1.0) {
                z_score[i] = Some((closes[i] - m) / s);
            }
        }

        let bandwidth_ma = match self.bandwidth_window {
            Some(w) => rolling_mean(&bandwidth, w),
            None => vec![None; n],
        };

        BollingerSeries {
            mean,
            std,
            upper,
            lower,
            bandwidth,
            bandwidth_ma,
            z_score,
        }
    }
}
