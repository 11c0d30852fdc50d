mod common;

use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;

use perp_signals::engine::Engine;
use perp_signals::indicators::rsi;
use perp_signals::models::{Candle, MarketState, SignalDirection, SignalGrade, Timeframe};

use common::{closed_candles, oversold_range_closes, test_config, tick, MockTickSource};

const STEP_5M: i64 = 300_000;

/// An RSI dip under 30 followed by a bounce back through it must come out of
/// the analyzer as a BUY, and the final series value must match a fresh
/// batch calculation over the same input.
#[tokio::test]
async fn rsi_oversold_cross_is_classified_buy() {
    let mut closes: Vec<f64> = vec![28.0];
    for _ in 0..30 {
        closes.push(closes.last().unwrap() - 0.25);
    }
    closes.push(31.0); // jump back through the threshold

    let analyzer = rsi::RsiAnalyzer::default();
    let result = rsi::calculate(&closes, 14);
    let n = closes.len();
    assert!(result.series[n - 2].unwrap() <= 30.0);
    assert!(result.series[n - 1].unwrap() > 30.0);
    assert_eq!(analyzer.signal(&result), SignalDirection::Buy);

    // Incremental equals batch on the transition bar.
    let prefix = rsi::calculate(&closes[..n - 1], 14);
    assert!((prefix.latest.unwrap() - result.series[n - 2].unwrap()).abs() < 1e-12);
}

/// Ranging regime end to end: seed from a mock source, stream the last bar,
/// and watch a graded BUY come out with predictions attached.
#[tokio::test]
async fn ranging_market_emits_graded_buy() {
    let closes = oversold_range_closes();
    let candles = closed_candles(&closes, STEP_5M, 1.0, 10.0);
    let (seed, live) = candles.split_at(candles.len() - 1);

    let mut data = HashMap::new();
    data.insert(Timeframe::M5, seed.to_vec());
    let source = MockTickSource { data };

    let (mut engine, snapshot_rx) = Engine::new(test_config()).unwrap();
    engine.seed(&source).await.unwrap();

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    engine.process_tick(tick(Timeframe::M5, live[0].clone()), now);

    let history = engine.signal_history();
    assert_eq!(history.len(), 1, "expected exactly one emitted signal");
    let signal = &history[0];
    assert_eq!(signal.direction, SignalDirection::Buy);
    assert_eq!(signal.market_state, MarketState::Ranging);
    assert_eq!(signal.strategy_used, "ranging");
    assert!(signal.strength >= 0.7, "strength {}", signal.strength);
    assert!(matches!(signal.grade, SignalGrade::A | SignalGrade::B));
    assert!(signal.reasons.len() >= 2, "reasons: {:?}", signal.reasons);

    // Predictions decay with horizon and point up.
    assert_eq!(signal.predictions.len(), 3);
    assert!(signal.predictions[0].confidence > signal.predictions[2].confidence);
    assert!(signal
        .predictions
        .iter()
        .all(|p| p.direction == SignalDirection::Buy));
    let entry = signal.entry_price;
    assert!(signal.predictions.iter().all(|p| p.target_price.unwrap() > entry));

    // The published snapshot reflects the same pass.
    let snapshot = snapshot_rx.borrow().clone();
    assert_eq!(snapshot.pending_verifications, 1);
    assert!(snapshot.current_signal.is_some());
}

/// Scenario: emitted BUY at entry, +1% at the 10-minute probe, -1% at the
/// 30-minute probe. Accuracy is 1/1 then 0/1, and checked always equals
/// correct plus wrong.
#[tokio::test]
async fn verification_follows_the_price_path() {
    let closes = oversold_range_closes();
    let candles = closed_candles(&closes, STEP_5M, 1.0, 10.0);
    let (seed, live) = candles.split_at(candles.len() - 1);

    let mut data = HashMap::new();
    data.insert(Timeframe::M5, seed.to_vec());
    let source = MockTickSource { data };

    let (mut engine, _snapshot_rx) = Engine::new(test_config()).unwrap();
    engine.seed(&source).await.unwrap();

    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    engine.process_tick(tick(Timeframe::M5, live[0].clone()), t0);
    assert_eq!(engine.signal_history().len(), 1);
    let entry = engine.signal_history()[0].entry_price;

    // Ten minutes on, price is 1% above entry: the 10m horizon resolves
    // correct. The probe rides on a fresh partial bar for the newest close.
    let up = Candle {
        open_time: live[0].open_time + 2 * STEP_5M,
        open: entry,
        high: entry * 1.0102,
        low: entry * 0.999,
        close: entry * 1.01,
        volume: 10.0,
        is_closed: false,
    };
    engine.process_tick(tick(Timeframe::M5, up.clone()), t0 + Duration::seconds(601));

    let ten = engine.accuracy().horizon(10);
    assert_eq!(ten.checked, 1);
    assert_eq!(ten.correct, 1);
    assert!((ten.accuracy() - 1.0).abs() < 1e-12);

    // Thirty minutes on, price is 1% below entry: the 30m horizon resolves
    // wrong.
    let down = Candle {
        open_time: live[0].open_time + 6 * STEP_5M,
        open: entry,
        high: entry * 1.001,
        low: entry * 0.989,
        close: entry * 0.99,
        volume: 10.0,
        is_closed: false,
    };
    engine.process_tick(tick(Timeframe::M5, down), t0 + Duration::seconds(1801));

    let thirty = engine.accuracy().horizon(30);
    assert_eq!(thirty.checked, 1);
    assert_eq!(thirty.correct, 0);
    assert!(thirty.accuracy().abs() < 1e-12);

    // Conservation at every horizon that has been probed.
    for h in [10u16, 30] {
        let stats = engine.accuracy().horizon(h);
        assert!(stats.checked >= stats.correct);
    }
}

/// Higher timeframes aligned with the primary trend confirm the signal and
/// the adjusted strength stays within the primary strength.
#[tokio::test]
async fn aligned_higher_timeframes_confirm() {
    // Primary: accelerating climb (trending regime, pullback BUY).
    let primary_closes: Vec<f64> = (0..120).map(|i| 2000.0 + 0.01 * (i * i) as f64).collect();
    let primary = closed_candles(&primary_closes, STEP_5M, 1.0, 10.0);
    let (seed, live) = primary.split_at(primary.len() - 1);

    // Confirmation frames: net drift up with pullbacks.
    let mut zigzag = vec![100.0f64];
    for i in 0..79 {
        let step = if i % 2 == 0 { 1.2 } else { -0.8 };
        zigzag.push(zigzag.last().unwrap() + step);
    }
    let m15 = closed_candles(&zigzag, 900_000, 0.6, 10.0);
    let h1 = closed_candles(&zigzag, 3_600_000, 0.6, 10.0);

    let mut data = HashMap::new();
    data.insert(Timeframe::M5, seed.to_vec());
    data.insert(Timeframe::M15, m15);
    data.insert(Timeframe::H1, h1);
    let source = MockTickSource { data };

    let (mut engine, _snapshot_rx) = Engine::new(test_config()).unwrap();
    engine.seed(&source).await.unwrap();

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    engine.process_tick(tick(Timeframe::M5, live[0].clone()), now);

    assert_eq!(engine.signal_history().len(), 1);
    let signal = &engine.signal_history()[0];
    assert_eq!(signal.direction, SignalDirection::Buy);
    assert_eq!(signal.strategy_used, "trending");
    assert!(signal.is_confirmed, "confirmations: {:?}", signal.timeframe_confirmations);
    assert!(signal.confirmation_count >= 1);
    assert!(signal.timeframe_confirmations.values().any(|&v| v));
    assert!(signal.adjusted_strength > 0.0);
    assert!(signal.adjusted_strength <= signal.strength + 1e-9);
}

/// A range break on flat volume still fires, but flagged: the volume warning
/// is attached and the strength is below the volume-confirmed variant.
#[tokio::test]
async fn breakout_without_volume_is_flagged() {
    let mut closes = Vec::new();
    let mut price = 100.0;
    for i in 0..60 {
        price += if i % 2 == 0 { 0.5 } else { -0.5 };
        closes.push(price);
    }
    let breakout_close = price + 12.0;

    let mut candles = closed_candles(&closes, STEP_5M, 1.0, 10.0);
    candles.push(Candle {
        open_time: 60 * STEP_5M,
        open: price,
        high: breakout_close + 1.0,
        low: breakout_close - 14.0,
        close: breakout_close,
        volume: 10.0, // no expansion
        is_closed: true,
    });
    let (seed, live) = candles.split_at(candles.len() - 1);

    let mut data = HashMap::new();
    data.insert(Timeframe::M5, seed.to_vec());
    let source = MockTickSource { data };

    let (mut engine, _snapshot_rx) = Engine::new(test_config()).unwrap();
    engine.seed(&source).await.unwrap();

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    engine.process_tick(tick(Timeframe::M5, live[0].clone()), now);

    assert_eq!(engine.signal_history().len(), 1);
    let signal = &engine.signal_history()[0];
    assert_eq!(signal.direction, SignalDirection::Buy);
    assert_eq!(signal.strategy_used, "breakout");
    assert_eq!(signal.market_state, MarketState::BreakoutUp);
    assert!(
        signal.warnings.iter().any(|w| w.contains("breakout without volume spike")),
        "warnings: {:?}",
        signal.warnings
    );
    assert!(
        signal.reasons.iter().any(|r| r.contains("without volume spike")),
        "reasons: {:?}",
        signal.reasons
    );
}

/// Replayed closed bars after a reconnect neither duplicate candles nor
/// re-emit signals.
#[tokio::test]
async fn replayed_bars_are_idempotent() {
    let closes = oversold_range_closes();
    let candles = closed_candles(&closes, STEP_5M, 1.0, 10.0);
    let (seed, live) = candles.split_at(candles.len() - 1);

    let mut data = HashMap::new();
    data.insert(Timeframe::M5, seed.to_vec());
    let source = MockTickSource { data };

    let (mut engine, _snapshot_rx) = Engine::new(test_config()).unwrap();
    engine.seed(&source).await.unwrap();

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    engine.process_tick(tick(Timeframe::M5, live[0].clone()), now);
    assert_eq!(engine.signal_history().len(), 1);

    // The exchange re-sends the sealed bar; nothing changes.
    engine.process_tick(tick(Timeframe::M5, live[0].clone()), now + Duration::seconds(1));
    assert_eq!(engine.signal_history().len(), 1);
}
