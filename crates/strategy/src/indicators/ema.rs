/// Exponential moving average of closes with `alpha = 2 / (span + 1)`.
///
/// Recursive form seeded with the first value, so it is defined from the
/// first candle onward.
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    pub span: usize,
}

impl EmaIndicator {
    pub fn new(span: usize) -> Self {
        assert!(span >= 1, "EMA span must be >= 1");
        Self { span }
    }

    pub fn alpha(&self) -> f64 {
        2.0 / (self.span as f64 + 1.0)
    }

    pub fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        ema(closes, self.span).into_iter().map(Some).collect()
    }
}

/// Full EMA series of `data` (oldest first).
pub fn ema(data: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let mut out = Vec::with_capacity(data.len());
    let mut prev: Option<f64> = None;
    for &price in data {
        let next = match prev {
            None => price,
            Some(p) => alpha * price + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn ema_seeds_with_first_close() {
        let out = EmaIndicator::new(9).compute(&[100.0, 110.0]);
        assert_eq!(out[0], Some(100.0));
        // alpha = 0.2
        assert_approx(out[1].unwrap(), 102.0, 1e-12);
    }

    #[test]
    fn ema_of_constant_is_constant() {
        let out = ema(&[5.0; 30], 21);
        assert!(out.iter().all(|v| (v - 5.0).abs() < 1e-12));
    }

    #[test]
    fn faster_ema_leads_in_uptrend() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let fast = ema(&closes, 9);
        let slow = ema(&closes, 21);
        assert!(fast[49] > slow[49]);
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(EmaIndicator::new(20).compute(&[]).is_empty());
    }
}
