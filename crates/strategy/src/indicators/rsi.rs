use serde::{Deserialize, Serialize};

use super::{mask_warmup, rolling_mean, smooth_recursive};

/// How average gains and losses are formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RsiSmoothing {
    /// Plain rolling mean over the last `period` changes.
    #[default]
    Simple,
    /// Wilder's exponential smoothing, `alpha = 1 / period`.
    Wilder,
}

/// RSI (Relative Strength Index) indicator.
///
/// `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`. The first price change is
/// counted as zero, so values exist from index `period - 1`. When the average
/// loss is exactly zero the ratio is undefined and the row is `None`
/// (an unbroken rally does not report 100).
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
    pub smoothing: RsiSmoothing,
}

impl RsiIndicator {
    pub fn new(period: usize, smoothing: RsiSmoothing) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        Self { period, smoothing }
    }

    /// RSI per close (oldest first).
    pub fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let n = closes.len();
        let mut gains = Vec::with_capacity(n);
        let mut losses = Vec::with_capacity(n);
        for i in 0..n {
            let change = if i == 0 { 0.0 } else { closes[i] - closes[i - 1] };
            if change.is_finite() {
                gains.push(Some(change.max(0.0)));
                losses.push(Some((-change).max(0.0)));
            } else {
                gains.push(None);
                losses.push(None);
            }
        }

        let (avg_gain, avg_loss) = match self.smoothing {
            RsiSmoothing::Simple => (
                rolling_mean(&gains, self.period),
                rolling_mean(&losses, self.period),
            ),
            RsiSmoothing::Wilder => {
                let alpha = 1.0 / self.period as f64;
                (smooth_recursive(&gains, alpha), smooth_recursive(&losses, alpha))
            }
        };

        let mut out: Vec<Option<f64>> = avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(g, l)| rsi_value((*g)?, (*l)?))
            .collect();
        mask_warmup(&mut out, self.period - 1);
        out
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss <= 0.0 {
        return None;
    }
    let rs = avg_gain / avg_loss;
    Some((100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0))
}
