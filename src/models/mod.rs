pub mod buffer;
pub mod candle;
pub mod direction;
pub mod timeframe;

pub use buffer::CandleBuffer;
pub use candle::{Candle, PriceArrays};
pub use direction::{
    ConfirmationOutcome, MarketState, MomentumLevel, SignalDirection, SignalGrade, TrendDirection,
    TrendStrength, VerificationOutcome, VolatilityLevel, VolumeCondition, VolumeTrend,
};
pub use timeframe::Timeframe;
