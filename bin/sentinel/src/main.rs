//! Sentinel CLI: backtests, live paper trading and regime scans over Binance
//! public market data.
//!
//! Commands:
//! - `backtest`: replay a strategy over recent candles and print the report
//! - `live`: poll the market and paper-trade a strategy until Ctrl-C
//! - `scan`: classify symbols by regime and name the best opportunity
//! - `presets`: list the built-in strategies

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use common::{Config, MarketData, NullSink, Timeframe, TradeSink};
use engine::{scan_symbols, Backtester, BinanceClient, LiveConfig, LiveSession};
use journal::TradeJournal;
use strategy::{
    best_opportunity, normalize_symbol, preset, presets, RegimeScanner, StrategyDefinition,
    StrategyFileConfig, StrategyRegistry, TrendContext,
};

#[derive(Parser)]
#[command(name = "sentinel", about = "Short-horizon directional bet lab for crypto pairs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a strategy over recent candles.
    Backtest {
        #[command(flatten)]
        selection: Selection,

        /// Candles to fetch. Defaults to the strategy history.
        #[arg(long)]
        history: Option<usize>,

        /// Also evaluate the last, possibly still-forming candle.
        #[arg(long, default_value_t = false)]
        include_forming: bool,

        /// Append settled trades to this CSV file.
        #[arg(long)]
        journal: Option<PathBuf>,

        /// Print the full report as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Paper-trade a strategy against live candles until Ctrl-C.
    Live {
        #[command(flatten)]
        selection: Selection,

        /// CSV trade log. Defaults to SENTINEL_JOURNAL_PATH.
        #[arg(long)]
        journal: Option<PathBuf>,

        /// Do not write a trade log.
        #[arg(long, default_value_t = false, conflicts_with = "journal")]
        no_journal: bool,
    },
    /// Classify symbols by market regime.
    Scan {
        /// Symbols to scan (e.g. BTC/USDT SOLUSDT).
        #[arg(default_values = ["BTCUSDT", "ETHUSDT", "SOLUSDT"])]
        symbols: Vec<String>,

        #[arg(long, default_value = "1m")]
        timeframe: Timeframe,
    },
    /// List the built-in presets.
    Presets,
}

#[derive(Args)]
struct Selection {
    /// Strategy name from the strategy file.
    #[arg(long)]
    strategy: Option<String>,

    /// Built-in preset name (see `sentinel presets`).
    #[arg(long, conflicts_with = "strategy")]
    preset: Option<String>,

    /// Strategy TOML file. Overrides SENTINEL_STRATEGY_FILE.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the strategy symbol.
    #[arg(long)]
    symbol: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid environment configuration")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            selection,
            history,
            include_forming,
            journal,
            json,
        } => {
            let def = select_strategy(&cfg, &selection)?;
            let market = BinanceClient::new(cfg.binance_base_url.as_str())?;
            backtest(&market, &def, history, include_forming, journal, json).await
        }
        Commands::Live {
            selection,
            journal,
            no_journal,
        } => {
            let def = select_strategy(&cfg, &selection)?;
            let market: Arc<dyn MarketData> = Arc::new(BinanceClient::new(cfg.binance_base_url.as_str())?);
            let sink: Box<dyn TradeSink> = if no_journal {
                Box::new(NullSink)
            } else {
                let path = journal.unwrap_or_else(|| PathBuf::from(&cfg.journal_path));
                info!(path = %path.display(), "Trade journal");
                Box::new(TradeJournal::open(&path)?)
            };

            let mut session = LiveSession::new(def, market, sink, LiveConfig::from(&cfg))?;
            session.run().await;
            println!("{}", session.summary());
            Ok(())
        }
        Commands::Scan { symbols, timeframe } => {
            let market = BinanceClient::new(cfg.binance_base_url.as_str())?;
            let symbols: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
            let readings = scan_symbols(&market, &RegimeScanner::default(), &symbols, timeframe).await;

            println!("{:<10} {:>10} {:>7} {:>8} {:>7} {:<9} {:>8}", "SYMBOL", "CLOSE", "ADX", "BW%", "%K", "REGIME", "SCORE");
            for r in &readings {
                let k = r.stoch_k.map(|k| format!("{k:.1}")).unwrap_or_else(|| "-".into());
                println!(
                    "{:<10} {:>10.4} {:>7.2} {:>8.3} {:>7} {:<9} {:>8.2}",
                    r.symbol, r.close, r.adx, r.bandwidth_pct, k, r.regime, r.score
                );
            }
            match best_opportunity(&readings) {
                Some(best) => println!("\nBest opportunity: {} ({}, score {:.2})", best.symbol, best.regime, best.score),
                None => bail!("no symbol returned enough data for a regime reading"),
            }
            Ok(())
        }
        Commands::Presets => {
            for p in presets() {
                let def = p.definition();
                println!("{:<20} {:<8} {:<4} {}", p.name, def.symbol, def.timeframe, p.summary);
            }
            Ok(())
        }
    }
}

/// `--preset` wins, then the strategy file (by `--strategy` name, else its
/// first entry). `--symbol` overrides either.
fn select_strategy(cfg: &Config, selection: &Selection) -> Result<StrategyDefinition> {
    let mut def = match (&selection.preset, strategy_file(cfg, selection)) {
        (Some(name), _) => preset(name)?,
        (None, Some(path)) => {
            let file = StrategyFileConfig::load(&path).with_context(|| format!("loading {path}"))?;
            let registry = StrategyRegistry::from_config(&file)?;
            let found = match &selection.strategy {
                Some(name) => registry.get(name),
                None => registry.iter().next(),
            };
            match found {
                Some(def) => def.clone(),
                None => bail!(
                    "strategy {} not found in {path}",
                    selection.strategy.as_deref().unwrap_or("(any)")
                ),
            }
        }
        (None, None) => bail!("choose a strategy with --preset or a strategy file (--config / SENTINEL_STRATEGY_FILE)"),
    };

    if let Some(symbol) = &selection.symbol {
        def.symbol = normalize_symbol(symbol);
    }
    def.validate()?;
    info!(strategy = %def.name, symbol = %def.symbol, timeframe = %def.timeframe, "Strategy selected");
    Ok(def)
}

fn strategy_file(cfg: &Config, selection: &Selection) -> Option<String> {
    selection
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .or_else(|| cfg.strategy_config_path.clone())
}

async fn backtest(
    market: &dyn MarketData,
    def: &StrategyDefinition,
    history: Option<usize>,
    include_forming: bool,
    journal: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let backtester = Backtester::new(def)?.include_forming_candle(include_forming);

    let candles = market
        .candles(&def.symbol, def.timeframe, history.unwrap_or(def.history))
        .await
        .with_context(|| format!("fetching {} {} candles", def.symbol, def.timeframe))?;
    info!(symbol = %def.symbol, candles = candles.len(), "Candles loaded");

    let trend = match &def.trend {
        Some(tc) => {
            let higher = market.candles(&def.symbol, tc.timeframe, tc.limit).await?;
            let ctx = TrendContext::from_candles(&higher, tc.span);
            info!(timeframe = %tc.timeframe, bias = ?ctx.bias, "Trend context");
            Some(ctx)
        }
        None => None,
    };

    let report = backtester.run(&candles, trend.as_ref());

    if let Some(path) = journal {
        let mut sink = TradeJournal::open(&path)?;
        for trade in &report.trades {
            sink.record(trade)?;
        }
        info!(path = %path.display(), rows = report.trades.len(), "Trades journaled");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let s = &report.stats;
        println!(
            "{} on {}: {} candles, {} signals ({} opened, {} rejected, {} vetoed, {} ambiguous), {} unready",
            report.strategy, report.symbol, report.candles, s.signals, s.opened, s.rejected, s.vetoed, s.ambiguous, s.unready
        );
        println!("{}", report.summary);
    }
    Ok(())
}
