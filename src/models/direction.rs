use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDirection::Buy => write!(f, "buy"),
            SignalDirection::Sell => write!(f, "sell"),
            SignalDirection::Hold => write!(f, "hold"),
        }
    }
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Buy => "buy",
            SignalDirection::Sell => "sell",
            SignalDirection::Hold => "hold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketState {
    Ranging,
    TrendingUp,
    TrendingDown,
    BreakoutUp,
    BreakoutDown,
    Unknown,
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketState::Ranging => write!(f, "ranging"),
            MarketState::TrendingUp => write!(f, "trending_up"),
            MarketState::TrendingDown => write!(f, "trending_down"),
            MarketState::BreakoutUp => write!(f, "breakout_up"),
            MarketState::BreakoutDown => write!(f, "breakout_down"),
            MarketState::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    None,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Up => write!(f, "up"),
            TrendDirection::Down => write!(f, "down"),
            TrendDirection::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    NoTrend,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl fmt::Display for TrendStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendStrength::NoTrend => write!(f, "no_trend"),
            TrendStrength::Weak => write!(f, "weak"),
            TrendStrength::Moderate => write!(f, "moderate"),
            TrendStrength::Strong => write!(f, "strong"),
            TrendStrength::VeryStrong => write!(f, "very_strong"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalGrade {
    A,
    B,
    C,
    #[serde(rename = "NONE")]
    None,
}

impl fmt::Display for SignalGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalGrade::A => write!(f, "A"),
            SignalGrade::B => write!(f, "B"),
            SignalGrade::C => write!(f, "C"),
            SignalGrade::None => write!(f, "NONE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeCondition {
    Spike,
    High,
    Normal,
    Low,
    VeryLow,
}

impl VolumeCondition {
    pub fn is_low(&self) -> bool {
        matches!(self, VolumeCondition::Low | VolumeCondition::VeryLow)
    }
}

impl fmt::Display for VolumeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeCondition::Spike => write!(f, "spike"),
            VolumeCondition::High => write!(f, "high"),
            VolumeCondition::Normal => write!(f, "normal"),
            VolumeCondition::Low => write!(f, "low"),
            VolumeCondition::VeryLow => write!(f, "very_low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for VolumeTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeTrend::Increasing => write!(f, "increasing"),
            VolumeTrend::Decreasing => write!(f, "decreasing"),
            VolumeTrend::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumLevel {
    Overbought,
    Bullish,
    Neutral,
    Bearish,
    Oversold,
}

impl fmt::Display for MomentumLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MomentumLevel::Overbought => write!(f, "overbought"),
            MomentumLevel::Bullish => write!(f, "bullish"),
            MomentumLevel::Neutral => write!(f, "neutral"),
            MomentumLevel::Bearish => write!(f, "bearish"),
            MomentumLevel::Oversold => write!(f, "oversold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityLevel {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityLevel::VeryHigh => write!(f, "very_high"),
            VolatilityLevel::High => write!(f, "high"),
            VolatilityLevel::Medium => write!(f, "medium"),
            VolatilityLevel::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    Confirmed,
    Rejected,
    Neutral,
}

impl fmt::Display for ConfirmationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationOutcome::Confirmed => write!(f, "confirmed"),
            ConfirmationOutcome::Rejected => write!(f, "rejected"),
            ConfirmationOutcome::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationOutcome {
    Correct,
    Wrong,
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationOutcome::Correct => write!(f, "correct"),
            VerificationOutcome::Wrong => write!(f, "wrong"),
        }
    }
}
