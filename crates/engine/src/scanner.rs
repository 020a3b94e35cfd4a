use tracing::{info, warn};

use common::{MarketData, Timeframe};
use strategy::{best_opportunity, RegimeReading, RegimeScanner};

/// Candles fetched per symbol.
pub const SCAN_LIMIT: usize = 1000;

/// Classify every symbol on `timeframe`, in input order. Symbols whose fetch
/// fails or whose series is too short are logged and left out.
pub async fn scan_symbols(
    market: &dyn MarketData,
    scanner: &RegimeScanner,
    symbols: &[String],
    timeframe: Timeframe,
) -> Vec<RegimeReading> {
    let mut readings = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let candles = match market.candles(symbol, timeframe, SCAN_LIMIT).await {
            Ok(c) => c,
            Err(e) => {
                warn!(%symbol, error = %e, "Regime scan fetch failed");
                continue;
            }
        };
        match scanner.analyze(symbol, &candles) {
            Some(reading) => {
                info!(
                    %symbol,
                    regime = %reading.regime,
                    adx = reading.adx,
                    bandwidth_pct = reading.bandwidth_pct,
                    score = reading.score,
                    "Regime reading"
                );
                readings.push(reading);
            }
            None => warn!(%symbol, candles = candles.len(), "Not enough candles for a regime reading"),
        }
    }
    if let Some(best) = best_opportunity(&readings) {
        info!(symbol = %best.symbol, score = best.score, "Best opportunity");
    }
    readings
}
