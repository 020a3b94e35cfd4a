pub mod config;
pub mod error;
pub mod market;
pub mod policy;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use market::{MarketData, NullSink, TradeSink};
pub use policy::{
    DiagnosticConfig, Horizon, PositionPolicy, DEFAULT_BREAKOUT_FRACTION, DEFAULT_PAYOUT_RATIO,
};
pub use types::*;
