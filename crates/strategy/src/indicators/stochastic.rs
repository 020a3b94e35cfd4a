use common::Candle;

use super::{rolling_max, rolling_min};

/// Stochastic oscillator %K: where the close sits inside the high–low range
/// of the last `window` candles, `100 * (close - LL) / (HH - LL)`.
/// A flat range is undefined.
#[derive(Debug, Clone)]
pub struct StochasticIndicator {
    pub window: usize,
}

impl StochasticIndicator {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "stochastic window must be >= 1");
        Self { window }
    }

    pub fn compute(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let highs: Vec<Option<f64>> = candles.iter().map(|c| Some(c.high)).collect();
        let lows: Vec<Option<f64>> = candles.iter().map(|c| Some(c.low)).collect();
        let hh = rolling_max(&highs, self.window);
        let ll = rolling_min(&lows, self.window);

        candles
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let (h, l) = (hh[i]?, ll[i]?);
                let range = h - l;
                (range > 0.0).then(|| 100.0 * (c.close - l) / range)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles};

    #[test]
    fn close_at_top_of_range_is_near_100() {
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0]);
        let out = StochasticIndicator::new(3).compute(&candles);
        assert!(out[1].is_none());
        // HH = 14, LL = 9 over indices 1..=3; close 13
        assert_approx(out[3].unwrap(), 80.0, 1e-12);
    }

    #[test]
    fn flat_range_is_undefined() {
        let mut candles = make_candles(&[5.0; 4]);
        for c in &mut candles {
            c.high = 5.0;
            c.low = 5.0;
        }
        assert!(StochasticIndicator::new(2).compute(&candles).iter().all(Option::is_none));
    }
}
