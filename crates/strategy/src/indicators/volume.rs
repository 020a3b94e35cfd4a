use common::Candle;

use super::rolling_mean;

/// Short rolling average of volume, used for the exhaustion heuristic
/// (`volume < average` means the move is running out of fuel).
#[derive(Debug, Clone)]
pub struct VolumeIndicator {
    pub window: usize,
}

impl VolumeIndicator {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "volume window must be >= 1");
        Self { window }
    }

    pub fn compute(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let volumes: Vec<Option<f64>> = candles
            .iter()
            .map(|c| (c.volume.is_finite() && c.volume >= 0.0).then_some(c.volume))
            .collect();
        rolling_mean(&volumes, self.window)
    }
}
