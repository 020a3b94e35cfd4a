pub mod config;
pub mod error;
pub mod evaluator;
pub mod indicators;
pub mod pipeline;
pub mod presets;
pub mod regime;
pub mod registry;
pub mod snapshot;
pub mod trend;

pub use config::{normalize_symbol, StrategyConfig, StrategyFileConfig};
pub use error::{Error, Result};
pub use evaluator::{Evaluation, Evaluator, Predicate, RuleSet, Signal};
pub use pipeline::{IndicatorConfig, IndicatorPipeline};
pub use presets::{preset, presets, Preset};
pub use regime::{best_opportunity, Regime, RegimeConfig, RegimeReading, RegimeScanner};
pub use registry::{StrategyDefinition, StrategyRegistry};
pub use snapshot::{IndicatorKey, IndicatorSnapshot};
pub use trend::{Confluence, TrendBias, TrendConfig, TrendContext};
