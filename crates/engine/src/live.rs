use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::{Error, Horizon, MarketData, Result, SettledTrade, TradeSink};
use performance::PerformanceSummary;
use strategy::{
    Error as StrategyError, Evaluation, Evaluator, IndicatorPipeline, StrategyDefinition,
    TrendContext,
};

use crate::lifecycle::{Admission, LifecycleConfig, TradeLifecycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveConfig {
    /// Delay between successful ticks.
    pub poll_interval: Duration,
    /// Delay after a failed tick.
    pub retry_delay: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            retry_delay: Duration::from_secs(10),
        }
    }
}

impl From<&common::Config> for LiveConfig {
    fn from(cfg: &common::Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            retry_delay: cfg.retry_delay,
        }
    }
}

/// Everything the live loop mutates. Owned by exactly one session.
#[derive(Debug, Clone)]
pub struct LiveState {
    pub lifecycle: TradeLifecycle,
    pub ticks: u64,
    pub failed_ticks: u64,
    /// Settled trades the sink failed to record. They are still in `history`.
    pub sink_failures: u64,
    pub history: Vec<SettledTrade>,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub settled: Vec<SettledTrade>,
    pub opened: Option<Uuid>,
}

/// Paper-trading loop for one strategy against a polled market-data source.
pub struct LiveSession {
    definition: StrategyDefinition,
    pipeline: IndicatorPipeline,
    evaluator: Evaluator,
    market: Arc<dyn MarketData>,
    sink: Box<dyn TradeSink>,
    config: LiveConfig,
    state: LiveState,
}

impl LiveSession {
    /// Candle horizons are converted to wall-clock time using the strategy
    /// timeframe, since live trades settle against the clock.
    pub fn new(
        definition: StrategyDefinition,
        market: Arc<dyn MarketData>,
        sink: Box<dyn TradeSink>,
        config: LiveConfig,
    ) -> std::result::Result<Self, StrategyError> {
        definition.validate()?;
        let mut lifecycle = LifecycleConfig::from_definition(&definition);
        if let Horizon::Candles(n) = lifecycle.horizon {
            let wall = u32::try_from(n)
                .ok()
                .and_then(|n| definition.timeframe.duration().checked_mul(n))
                .ok_or_else(|| {
                    StrategyError::InvalidConfig(format!(
                        "strategy '{}': a {n}-candle horizon does not fit a wall-clock duration",
                        definition.name
                    ))
                })?;
            lifecycle.horizon = Horizon::WallClock(wall);
        }
        Ok(Self {
            pipeline: definition.pipeline()?,
            evaluator: definition.evaluator()?,
            definition,
            market,
            sink,
            config,
            state: LiveState {
                lifecycle: TradeLifecycle::new(lifecycle),
                ticks: 0,
                failed_ticks: 0,
                sink_failures: 0,
                history: Vec::new(),
            },
        })
    }

    pub fn state(&self) -> &LiveState {
        &self.state
    }

    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary::from_trades(&self.state.history, self.state.lifecycle.config().payout_ratio)
    }

    /// One poll: settle due trades at the ticker price, then, if a slot is
    /// free, evaluate the latest snapshot and open on a signal.
    ///
    /// A sink failure does not fail the tick: the trade stays settled, is kept
    /// in `history` and is counted in `sink_failures`.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let def = &self.definition;
        let candles = self.market.candles(&def.symbol, def.timeframe, def.history).await?;
        if candles.is_empty() {
            return Err(Error::MarketData(format!("no candles returned for {}", def.symbol)));
        }

        let settled = if self.state.lifecycle.has_due_at_time(now) {
            let price = self.market.last_price(&def.symbol).await?;
            self.state.lifecycle.settle_due_at_time(now, price)
        } else {
            Vec::new()
        };
        for trade in &settled {
            if let Err(e) = self.sink.record(trade) {
                self.state.sink_failures += 1;
                warn!(id = %trade.id, error = %e, "Failed to record settled trade");
            }
        }
        self.state.history.extend(settled.iter().cloned());

        let mut outcome = TickOutcome {
            settled,
            opened: None,
        };
        if !self.state.lifecycle.has_capacity() {
            debug!(strategy = %def.name, active = self.state.lifecycle.active().len(), "No free slot");
            return Ok(outcome);
        }

        let trend = match &def.trend {
            Some(cfg) => {
                let higher = self.market.candles(&def.symbol, cfg.timeframe, cfg.limit).await?;
                Some(TrendContext::from_candles(&higher, cfg.span))
            }
            None => None,
        };

        let snapshots = self.pipeline.compute(&candles);
        let Some(snapshot) = snapshots.last() else {
            return Ok(outcome);
        };
        match self.evaluator.evaluate(snapshot, trend.as_ref()) {
            Evaluation::Signal(signal) => {
                if let Admission::Opened(id) = self.state.lifecycle.open(&signal, snapshot.close, now) {
                    outcome.opened = Some(id);
                }
            }
            Evaluation::Unready { missing } => {
                warn!(strategy = %def.name, %missing, candles = candles.len(), "Latest candle not ready");
            }
            other => debug!(strategy = %def.name, verdict = ?other, "No entry"),
        }
        Ok(outcome)
    }

    /// Poll until `shutdown` resolves. Failed ticks are logged and retried
    /// after `retry_delay`; cancellation only happens between ticks.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            strategy = %self.definition.name,
            symbol = %self.definition.symbol,
            timeframe = %self.definition.timeframe,
            poll_secs = self.config.poll_interval.as_secs(),
            "Live session started"
        );
        tokio::pin!(shutdown);

        loop {
            self.state.ticks += 1;
            let delay = match self.tick(Utc::now()).await {
                Ok(_) => self.config.poll_interval,
                Err(e) => {
                    self.state.failed_ticks += 1;
                    warn!(strategy = %self.definition.name, error = %e, "Tick failed, retrying");
                    self.config.retry_delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    info!(
                        ticks = self.state.ticks,
                        failed = self.state.failed_ticks,
                        open = self.state.lifecycle.active().len(),
                        settled = self.state.history.len(),
                        "Live session stopped"
                    );
                    break;
                }
            }
        }
    }

    /// Poll until Ctrl-C.
    pub async fn run(&mut self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;
    }
}
