use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use perp_signals::config::Config;
use perp_signals::exchange::{KlineTick, TickSource};
use perp_signals::models::{Candle, Timeframe};

/// A tick source serving canned candle history per timeframe.
pub struct MockTickSource {
    pub data: HashMap<Timeframe, Vec<Candle>>,
}

#[async_trait]
impl TickSource for MockTickSource {
    async fn backfill(&self, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let candles = self.data.get(&timeframe).cloned().unwrap_or_default();
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }
}

pub fn test_config() -> Config {
    let mut cfg = Config::from_env();
    cfg.symbol = "BTCUSDT".to_string();
    cfg.signal_log_path = std::env::temp_dir()
        .join(format!("perp_signals_integ_{}.log", std::process::id()))
        .to_string_lossy()
        .to_string();
    cfg.log_level = "error".to_string();
    cfg
}

/// Closed candles along the given closes, one bar per `step_ms`.
pub fn closed_candles(closes: &[f64], step_ms: i64, spread: f64, volume: f64) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle {
            open_time: i as i64 * step_ms,
            open: c,
            high: c + spread,
            low: c - spread,
            close: c,
            volume,
            is_closed: true,
        })
        .collect()
}

pub fn tick(tf: Timeframe, candle: Candle) -> KlineTick {
    KlineTick {
        timeframe: tf,
        candle,
    }
}

/// Sixty bars of chop then a fading slide: the classic ranging long setup
/// (ADX under 20, %B below zero, RSI oversold, volume drying up).
pub fn oversold_range_closes() -> Vec<f64> {
    let mut closes = Vec::new();
    let mut price = 100.0;
    for i in 0..60 {
        price += if i % 2 == 0 { 0.5 } else { -0.5 };
        closes.push(price);
    }
    for step in [-1.0, -1.0, 0.4, -1.0, -1.0, 0.4, -1.0, -1.2] {
        price += step;
        closes.push(price);
    }
    closes
}
