use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use common::{Candle, Error, MarketData, Result, Timeframe};
use strategy::normalize_symbol;

/// Binance allows at most this many klines per request.
const MAX_KLINES: usize = 1000;

/// Public (unsigned) Binance REST client for candles and ticker prices.
pub struct BinanceClient {
    base_url: String,
    http: Client,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::MarketData(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl MarketData for BinanceClient {
    /// Pages backwards with `endTime` when more than one request's worth of
    /// candles is asked for.
    async fn candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let symbol = normalize_symbol(symbol);
        let mut candles: Vec<Candle> = Vec::with_capacity(limit);
        let mut end_time: Option<i64> = None;

        while candles.len() < limit {
            let batch = (limit - candles.len()).min(MAX_KLINES);
            debug!(%symbol, %timeframe, batch, ?end_time, "Fetching klines");
            let mut query = vec![
                ("symbol", symbol.clone()),
                ("interval", timeframe.as_str().to_string()),
                ("limit", batch.to_string()),
            ];
            if let Some(end) = end_time {
                query.push(("endTime", end.to_string()));
            }
            let page = parse_klines(&self.get("/api/v3/klines", &query).await?)?;
            let Some(first) = page.first() else {
                break;
            };
            end_time = Some(first.timestamp.timestamp_millis() - 1);
            let exhausted = page.len() < batch;
            candles.splice(0..0, page);
            if exhausted {
                break;
            }
        }
        Ok(candles)
    }

    async fn last_price(&self, symbol: &str) -> Result<f64> {
        let body = self
            .get("/api/v3/ticker/price", &[("symbol", normalize_symbol(symbol))])
            .await?;
        let ticker: PriceTicker = serde_json::from_str(&body)?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|e| Error::MarketData(format!("bad ticker price '{}': {e}", ticker.price)))
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PriceTicker {
    price: String,
}

/// Rows are `[open_time, open, high, low, close, volume, close_time, ...]`
/// with prices as strings.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>> {
    let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(body)?;
    rows.iter()
        .map(|row| {
            if row.len() < 6 {
                return Err(Error::MarketData(format!("short kline row: {} fields", row.len())));
            }
            let open_ms = row[0]
                .as_i64()
                .ok_or_else(|| Error::MarketData(format!("bad kline open time {}", row[0])))?;
            let timestamp = Utc
                .timestamp_millis_opt(open_ms)
                .single()
                .ok_or_else(|| Error::MarketData(format!("bad kline timestamp {open_ms}")))?;
            Ok(Candle {
                timestamp,
                open: parse_field(&row[1])?,
                high: parse_field(&row[2])?,
                low: parse_field(&row[3])?,
                close: parse_field(&row[4])?,
                volume: parse_field(&row[5])?,
            })
        })
        .collect()
}

fn parse_field(value: &serde_json::Value) -> Result<f64> {
    value
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| Error::MarketData(format!("bad kline field {value}")))
}
