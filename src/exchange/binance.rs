use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::exchange::{parse_kline_frame, KlineTick, TickSource};
use crate::models::{Candle, Timeframe};

/// Binance USD-M futures market data: REST backfill plus one kline
/// WebSocket stream per interval. Public endpoints only, no signing.
pub struct BinanceFuturesClient {
    client: reqwest::Client,
    api_url: String,
    ws_url: String,
    symbol: String,
    contract_type: String,
    idle_timeout: Duration,
    ping_timeout: Duration,
    max_retries: usize,
}

impl BinanceFuturesClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(cfg.request_timeout_secs));
        if cfg.use_proxy && !cfg.proxy_url.is_empty() {
            let proxy = reqwest::Proxy::all(&cfg.proxy_url)
                .with_context(|| format!("invalid proxy url {}", cfg.proxy_url))?;
            builder = builder.proxy(proxy);
        }
        Ok(Self {
            client: builder.build().context("building http client")?,
            api_url: cfg.api_url.clone(),
            ws_url: cfg.ws_url.clone(),
            symbol: cfg.symbol.clone(),
            contract_type: cfg.contract_type.clone(),
            idle_timeout: Duration::from_secs(cfg.ws_idle_timeout_secs),
            ping_timeout: Duration::from_secs(cfg.ws_ping_timeout_secs),
            max_retries: cfg.max_retries,
        })
    }

    /// Read one interval's kline stream into the shared tick channel,
    /// reconnecting with exponential backoff capped at 10s. Gives up (and
    /// fails the engine) after `max_retries` consecutive failed attempts.
    pub async fn stream_klines(
        &self,
        timeframe: Timeframe,
        tx: mpsc::Sender<KlineTick>,
    ) -> Result<()> {
        let stream = format!("{}@kline_{}", self.symbol.to_lowercase(), timeframe);
        let url = format!("{}/ws/{}", self.ws_url, stream);
        let mut retries = 0usize;

        loop {
            match connect_async(&url).await {
                Ok((ws, _)) => {
                    info!("websocket connected: {}", stream);
                    retries = 0;
                    if self.read_frames(ws, timeframe, &tx).await {
                        // Receiver gone: the engine is shutting down.
                        return Ok(());
                    }
                    warn!("websocket closed: {}", stream);
                }
                Err(e) => {
                    warn!("websocket connect failed ({}): {}", stream, e);
                }
            }

            retries += 1;
            if retries >= self.max_retries {
                bail!("websocket {stream}: giving up after {retries} attempts");
            }
            let backoff = Duration::from_secs((1u64 << retries.min(4)).min(10));
            debug!("reconnecting {} in {:?}", stream, backoff);
            tokio::time::sleep(backoff).await;
        }
    }

    /// Returns true when the engine side dropped the channel.
    async fn read_frames(
        &self,
        ws: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        timeframe: Timeframe,
        tx: &mpsc::Sender<KlineTick>,
    ) -> bool {
        let (mut write, mut read) = ws.split();
        let mut awaiting_pong = false;

        loop {
            let timeout = if awaiting_pong {
                self.ping_timeout
            } else {
                self.idle_timeout
            };
            let frame = match tokio::time::timeout(timeout, read.next()).await {
                Ok(frame) => frame,
                Err(_) if awaiting_pong => {
                    warn!("ping timed out on {} stream", timeframe);
                    return false;
                }
                Err(_) => {
                    // Idle: nudge the server and wait once more.
                    if write.send(Message::Ping(Vec::new().into())).await.is_err() {
                        return false;
                    }
                    awaiting_pong = true;
                    continue;
                }
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    awaiting_pong = false;
                    match parse_kline_frame(&text) {
                        Ok(candle) => {
                            if tx.send(KlineTick { timeframe, candle }).await.is_err() {
                                return true;
                            }
                        }
                        Err(e) => {
                            // Drop only this frame.
                            warn!("dropping malformed frame on {}: {}", timeframe, e);
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if write.send(Message::Pong(payload)).await.is_err() {
                        return false;
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    awaiting_pong = false;
                }
                Some(Ok(Message::Close(_))) | None => return false,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("websocket error on {}: {}", timeframe, e);
                    return false;
                }
            }
        }
    }
}

#[async_trait]
impl TickSource for BinanceFuturesClient {
    async fn backfill(&self, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let url = format!("{}/fapi/v1/continuousKlines", self.api_url);
        let limit = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("pair", self.symbol.as_str()),
                ("contractType", self.contract_type.as_str()),
                ("interval", timeframe.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("kline backfill request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("kline backfill error {}: {}", status, body);
        }

        let rows: Vec<Vec<serde_json::Value>> =
            response.json().await.context("parsing backfill response")?;
        let now_ms = chrono::Utc::now().timestamp_millis();

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            match parse_backfill_row(&row, now_ms) {
                Ok(candle) => candles.push(candle),
                Err(e) => warn!("skipping malformed backfill row: {}", e),
            }
        }
        candles.sort_by_key(|c| c.open_time);
        Ok(candles)
    }
}

/// Rows are 12-element arrays: open time, O/H/L/C/V as strings, close time,
/// then fields we ignore. A historical bar is closed once its close time has
/// passed.
fn parse_backfill_row(row: &[serde_json::Value], now_ms: i64) -> Result<Candle> {
    if row.len() < 7 {
        bail!("row has {} fields, expected at least 7", row.len());
    }
    let int = |v: &serde_json::Value, name: &str| -> Result<i64> {
        v.as_i64().with_context(|| format!("{name} is not an integer"))
    };
    let num = |v: &serde_json::Value, name: &str| -> Result<f64> {
        let parsed = match v {
            serde_json::Value::String(s) => s.parse::<f64>().ok(),
            other => other.as_f64(),
        }
        .with_context(|| format!("{name} is not a number"))?;
        if !parsed.is_finite() {
            bail!("{name} is not finite");
        }
        Ok(parsed)
    };

    let open_time = int(&row[0], "open_time")?;
    let close_time = int(&row[6], "close_time")?;
    Ok(Candle {
        open_time,
        open: num(&row[1], "open")?,
        high: num(&row[2], "high")?,
        low: num(&row[3], "low")?,
        close: num(&row[4], "close")?,
        volume: num(&row[5], "volume")?,
        is_closed: close_time < now_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backfill_row_parsing() {
        let row = vec![
            json!(1700000000000i64),
            json!("100.5"),
            json!("101.0"),
            json!("99.5"),
            json!("100.8"),
            json!("42.0"),
            json!(1700000299999i64),
        ];
        let candle = parse_backfill_row(&row, 1700009999999).unwrap();
        assert_eq!(candle.open_time, 1700000000000);
        assert!((candle.high - 101.0).abs() < 1e-9);
        assert!(candle.is_closed);

        // A bar whose close time is still in the future stays open.
        let open = parse_backfill_row(&row, 1700000100000).unwrap();
        assert!(!open.is_closed);
    }

    #[test]
    fn backfill_row_rejects_short_rows() {
        let row = vec![json!(1), json!("1")];
        assert!(parse_backfill_row(&row, 0).is_err());
    }

    #[test]
    fn backfill_row_rejects_bad_numbers() {
        let row = vec![
            json!(1i64),
            json!("not-a-price"),
            json!("1"),
            json!("1"),
            json!("1"),
            json!("1"),
            json!(2i64),
        ];
        assert!(parse_backfill_row(&row, 0).is_err());
    }
}
