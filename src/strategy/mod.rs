pub mod breakout;
pub mod generator;
pub mod market_state;
pub mod multi_timeframe;
pub mod ranging;
pub mod resonance;
pub mod signal;
pub mod trending;

pub use generator::SignalGenerator;
pub use market_state::{MarketStateDetector, MarketStateResult};
pub use multi_timeframe::{MtfConfirmer, MtfResult};
pub use resonance::{ResonanceScore, ResonanceScorer};
pub use signal::{Prediction, StrategySignal, TradingSignal};
