pub mod backtest;
pub mod binance;
pub mod lifecycle;
pub mod live;
pub mod scanner;

pub use backtest::{BacktestReport, BacktestStats, Backtester};
pub use binance::BinanceClient;
pub use lifecycle::{Admission, Deadline, LifecycleConfig, Rejection, Trade, TradeLifecycle};
pub use live::{LiveConfig, LiveSession, LiveState, TickOutcome};
pub use scanner::scan_symbols;
