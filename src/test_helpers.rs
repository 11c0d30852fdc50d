use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::config::Config;
use crate::models::{PriceArrays, SignalDirection, SignalGrade, MarketState, Timeframe};
use crate::strategy::TradingSignal;

/// A deterministic Config for tests: defaults only, no env reads, log file
/// under the temp dir.
pub fn default_test_config() -> Config {
    use crate::config::*;

    let mut weights = HashMap::new();
    weights.insert(Timeframe::M5, 0.40);
    weights.insert(Timeframe::M15, 0.35);
    weights.insert(Timeframe::H1, 0.25);

    Config {
        symbol: "BTCUSDT".to_string(),
        primary_interval: Timeframe::M5,
        contract_type: "perpetual".to_string(),
        history: 200,
        buffer_size: 500,

        api_url: "https://fapi.binance.com".to_string(),
        ws_url: "wss://fstream.binance.com".to_string(),
        use_proxy: false,
        proxy_url: String::new(),
        ws_idle_timeout_secs: 60,
        ws_ping_timeout_secs: 10,
        request_timeout_secs: 30,
        max_retries: 10,

        toggles: IndicatorToggles {
            use_macd: true,
            use_rsi: true,
            use_kdj: true,
            use_boll: true,
            use_ema: true,
            use_cci: false,
            use_atr: true,
            use_vwap: false,
            use_volume: true,
            use_adx: true,
        },
        indicators: IndicatorParams {
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            kdj_period: 9,
            kdj_smooth: 3,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
            adx_period: 14,
            cci_period: 20,
            ema_fast: 5,
            ema_medium: 20,
            ema_slow: 60,
            volume_ma_period: 20,
        },
        market_state: MarketStateThresholds {
            adx_ranging: 20.0,
            adx_trending: 25.0,
            adx_strong_trend: 40.0,
            volume_spike_for_breakout: 1.5,
            atr_spike_for_breakout: 1.3,
        },
        ranging: RangingParams {
            enabled: true,
            bb_lower_threshold: 0.15,
            bb_upper_threshold: 0.85,
            rsi_oversold: 35.0,
            rsi_overbought: 65.0,
            kdj_oversold: 25.0,
            kdj_overbought: 75.0,
            j_extreme_low: 10.0,
            j_extreme_high: 90.0,
            min_strength: 0.3,
        },
        trending: TrendingParams {
            enabled: true,
            ema_pullback_threshold: 0.015,
            rsi_healthy_low: 40.0,
            rsi_healthy_high: 70.0,
            macd_confirmation: true,
        },
        breakout: BreakoutParams {
            enabled: true,
            lookback_period: 20,
            min_breakout_atr: 0.5,
            volume_confirmation: true,
            min_volume_ratio: 1.5,
            atr_expansion_threshold: 1.2,
        },
        mtf: MtfConfig {
            enabled: true,
            confirmation_timeframes: vec![Timeframe::M15, Timeframe::H1],
            min_confirmations: 1,
            weights,
        },
        grades: GradeThresholds {
            strong: 0.75,
            standard: 0.50,
            weak: 0.30,
        },
        prediction_horizons: vec![10, 30, 60],

        min_resonance: None,
        min_score: 70.0,

        verification_pending_cap: 50,
        signal_log_path: std::env::temp_dir()
            .join(format!("perp_signals_test_{}.log", std::process::id()))
            .to_string_lossy()
            .to_string(),
        log_interval_secs: 5,
        log_level: "error".to_string(),
    }
}

/// PriceArrays from (open, high, low, close, volume) tuples.
pub fn price_arrays(rows: &[(f64, f64, f64, f64, f64)]) -> PriceArrays {
    let mut arrays = PriceArrays::default();
    for &(o, h, l, c, v) in rows {
        arrays.opens.push(o);
        arrays.highs.push(h);
        arrays.lows.push(l);
        arrays.closes.push(c);
        arrays.volumes.push(v);
    }
    arrays
}

/// Strong monotone trend, slope `2 * direction` per bar. Saturates ADX well
/// above the strong-trend threshold.
pub fn trending_series(n: usize, direction: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let base = if direction >= 0.0 { 100.0 } else { 400.0 };
    let closes: Vec<f64> = (0..n).map(|i| base + i as f64 * 2.0 * direction).collect();
    let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
    let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
    let volumes = vec![10.0; n];
    (highs, lows, closes, volumes)
}

/// Net drift with pullbacks (+1.2 / -0.8 per bar, scaled by `direction`).
/// Keeps RSI in the 35-65 band, which the multi-timeframe checks need.
pub fn zigzag_trend_series(n: usize, direction: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let base = if direction >= 0.0 { 100.0 } else { 200.0 };
    let mut closes = vec![base];
    for i in 0..n.saturating_sub(1) {
        let step = if i % 2 == 0 { 1.2 } else { -0.8 };
        closes.push(closes[closes.len() - 1] + step * direction);
    }
    let highs: Vec<f64> = closes.iter().map(|c| c + 0.6).collect();
    let lows: Vec<f64> = closes.iter().map(|c| c - 0.6).collect();
    let volumes = vec![10.0; n];
    (highs, lows, closes, volumes)
}

/// Directionless chop: alternating half-point moves. ADX stays near zero.
pub fn choppy_series(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut closes = Vec::with_capacity(n);
    let mut price = 100.0;
    for i in 0..n {
        price += if i % 2 == 0 { 0.5 } else { -0.5 };
        closes.push(price);
    }
    let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
    let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
    let volumes = vec![10.0; n];
    (highs, lows, closes, volumes)
}

/// Sixty bars of chop, then a fading slide onto drying volume. Ends with
/// ADX under 20, %B below zero, RSI oversold, KDJ J pinned low: the ranging
/// strategy's textbook long.
pub fn oversold_range_series() -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let (mut highs, mut lows, mut closes, mut volumes) = choppy_series(60);
    let slide = [-1.0, -1.0, 0.4, -1.0, -1.0, 0.4, -1.0, -1.2];
    let mut price = closes[closes.len() - 1];
    for (j, step) in slide.iter().enumerate() {
        price += step;
        closes.push(price);
        highs.push(price + 1.0);
        lows.push(price - 1.0);
        volumes.push((9.0 - j as f64).max(4.0));
    }
    (highs, lows, closes, volumes)
}

/// Accelerating climb: perfect EMA stack, close within the pullback band of
/// EMA20, MACD histogram positive.
pub fn pullback_uptrend_series() -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let closes: Vec<f64> = (0..120).map(|i| 2000.0 + 0.01 * (i * i) as f64).collect();
    let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
    let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
    let volumes = vec![10.0; 120];
    (highs, lows, closes, volumes)
}

/// Quiet range, then one wide expansion bar clearing the 20-bar high by
/// several ATR. `with_volume` toggles the confirming volume spike.
pub fn breakout_series(with_volume: bool) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let (mut highs, mut lows, mut closes, mut volumes) = choppy_series(60);
    let price = closes[closes.len() - 1] + 12.0;
    closes.push(price);
    highs.push(price + 1.0);
    lows.push(price - 14.0);
    volumes.push(if with_volume { 50.0 } else { 10.0 });
    (highs, lows, closes, volumes)
}

/// A minimal emitted signal for tracker and log tests.
pub fn make_signal(
    cfg: &Config,
    direction: SignalDirection,
    entry_price: f64,
    timestamp: DateTime<Utc>,
) -> TradingSignal {
    TradingSignal {
        id: format!("SIG-{:06}", timestamp.timestamp_millis() % 1_000_000),
        timestamp,
        symbol: cfg.symbol.clone(),
        direction,
        strength: 0.7,
        adjusted_strength: 0.7,
        grade: SignalGrade::B,
        market_state: MarketState::Ranging,
        strategy_used: "ranging".to_string(),
        is_confirmed: true,
        confirmation_count: 1,
        timeframe_confirmations: HashMap::new(),
        entry_price,
        stop_loss: Some(entry_price * 0.98),
        take_profit: Some(entry_price * 1.03),
        predictions: Vec::new(),
        reasons: vec!["test signal".to_string()],
        warnings: Vec::new(),
        indicator_values: Default::default(),
    }
}
