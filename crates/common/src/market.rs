use async_trait::async_trait;

use crate::{Candle, Result, SettledTrade, Timeframe};

/// Source of candle data.
///
/// `BinanceClient` in `crates/engine` implements this against the public REST
/// API. Failures are treated by callers as "no data this tick".
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Up to `limit` most recent candles for `symbol`, oldest first. The last
    /// candle may still be forming.
    async fn candles(&self, symbol: &str, timeframe: Timeframe, limit: usize)
        -> Result<Vec<Candle>>;

    /// Latest traded price for `symbol`.
    async fn last_price(&self, symbol: &str) -> Result<f64>;
}

/// Append-only destination for settled trades (one record per settlement).
pub trait TradeSink: Send {
    fn record(&mut self, trade: &SettledTrade) -> Result<()>;
}

/// Discards every record. Used when no trade log is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TradeSink for NullSink {
    fn record(&mut self, _trade: &SettledTrade) -> Result<()> {
        Ok(())
    }
}

impl<S: TradeSink + ?Sized> TradeSink for Box<S> {
    fn record(&mut self, trade: &SettledTrade) -> Result<()> {
        (**self).record(trade)
    }
}

impl TradeSink for Vec<SettledTrade> {
    fn record(&mut self, trade: &SettledTrade) -> Result<()> {
        self.push(trade.clone());
        Ok(())
    }
}
