pub mod binance;

pub use binance::BinanceFuturesClient;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{Candle, Timeframe};

/// A parsed kline update tagged with the stream it came from.
#[derive(Debug, Clone)]
pub struct KlineTick {
    pub timeframe: Timeframe,
    pub candle: Candle,
}

/// Seam for seeding buffers with history; the live path pushes `KlineTick`s
/// through a channel instead. Mocked in tests.
#[async_trait]
pub trait TickSource: Send + Sync {
    async fn backfill(&self, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>>;
}

#[derive(Debug, Deserialize)]
struct KlineEvent {
    k: KlinePayload,
}

/// The `k` object of a kline stream frame. Prices arrive string-encoded.
#[derive(Debug, Deserialize)]
struct KlinePayload {
    t: i64,
    o: String,
    h: String,
    l: String,
    c: String,
    v: String,
    x: bool,
}

/// Parse one WebSocket kline frame into a candle. Anything malformed or
/// non-finite is an error and the frame is dropped upstream; the buffer
/// itself never sees bad data.
pub fn parse_kline_frame(text: &str) -> Result<Candle> {
    let event: KlineEvent = serde_json::from_str(text).context("malformed kline frame")?;
    candle_from_payload(&event.k)
}

fn candle_from_payload(payload: &KlinePayload) -> Result<Candle> {
    let parse = |field: &str, value: &str| -> Result<f64> {
        let parsed: f64 = value
            .parse()
            .with_context(|| format!("kline field {field} is not a number: {value:?}"))?;
        if !parsed.is_finite() {
            bail!("kline field {field} is not finite: {value:?}");
        }
        Ok(parsed)
    };

    let candle = Candle {
        open_time: payload.t,
        open: parse("o", &payload.o)?,
        high: parse("h", &payload.h)?,
        low: parse("l", &payload.l)?,
        close: parse("c", &payload.c)?,
        volume: parse("v", &payload.v)?,
        is_closed: payload.x,
    };
    if candle.volume < 0.0 {
        bail!("kline volume is negative: {}", candle.volume);
    }
    Ok(candle)
}
