use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::indicators::IndicatorSnapshot;
use crate::models::{MarketState, SignalDirection, SignalGrade, Timeframe};

/// What a sub-strategy hands back to the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySignal {
    pub direction: SignalDirection,
    pub strength: f64,
    pub strategy_name: String,
    pub reasons: Vec<String>,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub indicator_values: IndicatorSnapshot,
    pub signal_count: usize,
}

impl StrategySignal {
    pub fn hold(strategy_name: &str, reason: &str, indicator_values: IndicatorSnapshot) -> Self {
        Self {
            direction: SignalDirection::Hold,
            strength: 0.0,
            strategy_name: strategy_name.to_string(),
            reasons: vec![reason.to_string()],
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            indicator_values,
            signal_count: 0,
        }
    }

    pub fn is_actionable(&self, min_strength: f64) -> bool {
        self.direction != SignalDirection::Hold && self.strength >= min_strength
    }
}

/// Short-horizon directional prediction attached to an emitted signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub horizon_minutes: u16,
    pub direction: SignalDirection,
    pub confidence: f64,
    pub target_price: Option<f64>,
}

/// The fully decorated signal the engine emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,

    pub direction: SignalDirection,
    pub strength: f64,
    pub adjusted_strength: f64,
    pub grade: SignalGrade,

    pub market_state: MarketState,
    pub strategy_used: String,

    pub is_confirmed: bool,
    pub confirmation_count: usize,
    pub timeframe_confirmations: HashMap<Timeframe, bool>,

    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,

    pub predictions: Vec<Prediction>,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub indicator_values: IndicatorSnapshot,
}

impl TradingSignal {
    /// Human-readable block for the console and the append-only log.
    pub fn summary(&self) -> String {
        if self.direction == SignalDirection::Hold {
            return format!(
                "[{}] no signal - {}",
                self.id,
                self.reasons.first().map(String::as_str).unwrap_or("unknown")
            );
        }

        let mut lines = vec![
            format!("signal {} [{}]", self.id, self.grade),
            format!(
                "  direction={} strength={:.0}% -> {:.0}% (adjusted)",
                self.direction,
                self.strength * 100.0,
                self.adjusted_strength * 100.0
            ),
            format!(
                "  state={} strategy={} confirmed={} ({} timeframes)",
                self.market_state, self.strategy_used, self.is_confirmed, self.confirmation_count
            ),
            format!("  entry={:.2}", self.entry_price),
        ];
        if let Some(sl) = self.stop_loss {
            lines.push(format!("  stop_loss={:.2}", sl));
        }
        if let Some(tp) = self.take_profit {
            lines.push(format!("  take_profit={:.2}", tp));
        }
        for p in &self.predictions {
            let target = p
                .target_price
                .map(|t| format!(" target={:.2}", t))
                .unwrap_or_default();
            lines.push(format!(
                "  predict {}m: {} confidence={:.0}%{}",
                p.horizon_minutes,
                p.direction,
                p.confidence * 100.0,
                target
            ));
        }
        for r in &self.reasons {
            lines.push(format!("  + {}", r));
        }
        for w in &self.warnings {
            lines.push(format!("  ! {}", w));
        }
        lines.join("\n")
    }
}
