use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::exchange::{KlineTick, TickSource};
use crate::models::{CandleBuffer, MarketState, PriceArrays, SignalDirection, Timeframe};
use crate::indicators::IndicatorSnapshot;
use crate::strategy::resonance::{BarContext, ResonanceScore, ResonanceScorer};
use crate::strategy::{SignalGenerator, TradingSignal};
use crate::tracking::{AccuracyStats, SignalLog, VerificationTracker};

/// Immutable per-tick view for external readers (dashboard renderer). A new
/// value is published only after the full pipeline pass completes, so a
/// reader sees either the pre-update or the post-update state, never a mix.
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshot {
    pub symbol: String,
    pub current_price: f64,
    pub market_state: Option<MarketState>,
    pub current_signal: Option<TradingSignal>,
    pub total_signals: u64,
    pub buy_signals: u64,
    pub sell_signals: u64,
    pub pending_verifications: usize,
    pub accuracy: AccuracyStats,
    pub resonance: Option<ResonanceScore>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Per-symbol coordinator: serializes ticks into the buffers, reruns the
/// pipeline on primary-interval updates, tracks verifications, and appends
/// to the signal journal.
pub struct Engine {
    config: Config,
    buffers: HashMap<Timeframe, CandleBuffer>,
    generator: SignalGenerator,
    resonance: ResonanceScorer,
    tracker: VerificationTracker,
    log: SignalLog,
    snapshot_tx: watch::Sender<EngineSnapshot>,

    signal_history: Vec<TradingSignal>,
    total_signals: u64,
    buy_signals: u64,
    sell_signals: u64,
    current_price: f64,
    last_state: Option<MarketState>,
    last_snapshot_values: Option<IndicatorSnapshot>,
}

impl Engine {
    pub fn new(config: Config) -> Result<(Self, watch::Receiver<EngineSnapshot>)> {
        let mut buffers = HashMap::new();
        buffers.insert(
            config.primary_interval,
            CandleBuffer::new(config.buffer_size),
        );
        for tf in &config.mtf.confirmation_timeframes {
            buffers.insert(*tf, CandleBuffer::new(config.buffer_size));
        }

        let log = SignalLog::open(&config.signal_log_path)?;
        let generator = SignalGenerator::new(&config);
        let resonance = ResonanceScorer::new(&config);
        let tracker = VerificationTracker::new(
            config.prediction_horizons.clone(),
            config.verification_pending_cap,
        );

        let (snapshot_tx, snapshot_rx) = watch::channel(EngineSnapshot {
            symbol: config.symbol.clone(),
            ..Default::default()
        });

        Ok((
            Self {
                config,
                buffers,
                generator,
                resonance,
                tracker,
                log,
                snapshot_tx,
                signal_history: Vec::new(),
                total_signals: 0,
                buy_signals: 0,
                sell_signals: 0,
                current_price: 0.0,
                last_state: None,
                last_snapshot_values: None,
            },
            snapshot_rx,
        ))
    }

    /// Seed every configured buffer from REST history before streaming.
    pub async fn seed(&mut self, source: &dyn TickSource) -> Result<()> {
        let mut intervals = vec![self.config.primary_interval];
        intervals.extend(self.config.mtf.confirmation_timeframes.iter().copied());

        for tf in intervals {
            let candles = source
                .backfill(tf, self.config.history)
                .await
                .with_context(|| format!("backfilling {tf}"))?;
            let buffer = self.buffers.get_mut(&tf).expect("buffer exists");
            let count = candles.len();
            for candle in candles {
                buffer.update(candle);
            }
            info!("seeded {} with {} bars", tf, count);
        }
        Ok(())
    }

    /// Main loop: apply ticks in arrival order, probe verifications on a 1s
    /// timer, stop cleanly on ctrl-c.
    pub async fn run(&mut self, mut ticks: mpsc::Receiver<KlineTick>) -> Result<()> {
        info!(
            "engine running: {} primary={} confirm={:?}",
            self.config.symbol,
            self.config.primary_interval,
            self.config
                .mtf
                .confirmation_timeframes
                .iter()
                .map(Timeframe::as_str)
                .collect::<Vec<_>>()
        );
        let mut verify_timer =
            tokio::time::interval(std::time::Duration::from_secs(1));
        let mut status_timer = tokio::time::interval(std::time::Duration::from_secs(
            self.config.log_interval_secs.max(1),
        ));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    self.shutdown();
                    return Ok(());
                }
                maybe_tick = ticks.recv() => {
                    let Some(tick) = maybe_tick else {
                        bail!("tick stream closed");
                    };
                    self.process_tick(tick, Utc::now());
                }
                _ = verify_timer.tick() => {
                    self.poll_verifications(Utc::now());
                }
                _ = status_timer.tick() => {
                    self.print_status();
                }
            }
        }
    }

    fn print_status(&self) {
        let state = self
            .last_state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "warming up".to_string());
        info!(
            "{} price={:.2} state={} signals={} ({}B/{}S) pending={}",
            self.config.symbol,
            self.current_price,
            state,
            self.total_signals,
            self.buy_signals,
            self.sell_signals,
            self.tracker.pending_len()
        );
    }

    /// One tick through the whole pipeline. Split out from `run` so tests
    /// can drive it with synthetic clocks.
    pub fn process_tick(&mut self, tick: KlineTick, now: DateTime<Utc>) {
        let Some(buffer) = self.buffers.get_mut(&tick.timeframe) else {
            debug!("tick for unsubscribed interval {}", tick.timeframe);
            return;
        };
        let is_primary = tick.timeframe == self.config.primary_interval;
        let bar = BarContext {
            close: tick.candle.close,
            high: tick.candle.high,
            low: tick.candle.low,
            previous_close: (self.current_price > 0.0).then_some(self.current_price),
        };
        buffer.update(tick.candle);

        if !is_primary {
            return;
        }
        self.current_price = bar.close;

        let primary = self.buffers[&self.config.primary_interval].get_price_arrays(true);
        if primary.closes.len() < 60 {
            self.poll_verifications(now);
            return;
        }

        // Confirmation frames use closed bars only; a live partial bar makes
        // the higher-timeframe verdict flap.
        let mut timeframe_data: HashMap<Timeframe, PriceArrays> = HashMap::new();
        for tf in &self.config.mtf.confirmation_timeframes {
            if let Some(buf) = self.buffers.get(tf) {
                let arrays = buf.get_price_arrays(false);
                if arrays.closes.len() >= 30 {
                    timeframe_data.insert(*tf, arrays);
                }
            }
        }

        let signal = self.generator.generate(&primary, &timeframe_data, now);
        self.last_state = Some(signal.market_state);

        let open_time = self.buffers[&self.config.primary_interval].current_open_time();
        if self.tracker.track(&signal, open_time) {
            self.total_signals += 1;
            match signal.direction {
                SignalDirection::Buy => self.buy_signals += 1,
                SignalDirection::Sell => self.sell_signals += 1,
                SignalDirection::Hold => {}
            }
            info!("\n{}", signal.summary());
            if let Err(e) = self.log.log_signal(&signal) {
                warn!("signal log write failed: {}", e);
            }
            self.signal_history.push(signal.clone());
            if self.signal_history.len() > 100 {
                self.signal_history.remove(0);
            }
        }

        // The resonance read rides on the same snapshot pair the dashboard
        // sees: current values against the prior pipeline pass.
        let resonance_score = self.resonance.score(
            &signal.indicator_values,
            self.last_snapshot_values.as_ref(),
            &bar,
        );
        self.last_snapshot_values = Some(signal.indicator_values.clone());

        // Probed strictly after the buffer update and recomputation, so the
        // accuracy observation uses the newest close.
        self.poll_verifications(now);
        self.publish_snapshot(signal, resonance_score, now);
    }

    pub fn poll_verifications(&mut self, now: DateTime<Utc>) {
        let resolutions = self.tracker.poll(now, self.current_price);
        for resolution in &resolutions {
            info!(
                "verified {} {}m: {} ({:+.2}%)",
                resolution.signal_id,
                resolution.horizon_minutes,
                resolution.outcome,
                resolution.profit_pct
            );
            if let Err(e) = self.log.log_resolution(resolution) {
                warn!("verification log write failed: {}", e);
            }
        }
    }

    fn publish_snapshot(&self, signal: TradingSignal, resonance: ResonanceScore, now: DateTime<Utc>) {
        let snapshot = EngineSnapshot {
            symbol: self.config.symbol.clone(),
            current_price: self.current_price,
            market_state: self.last_state,
            current_signal: Some(signal),
            total_signals: self.total_signals,
            buy_signals: self.buy_signals,
            sell_signals: self.sell_signals,
            pending_verifications: self.tracker.pending_len(),
            accuracy: self.tracker.stats.clone(),
            resonance: Some(resonance),
            last_update: Some(now),
        };
        // Nobody listening is fine; the dashboard is optional.
        let _ = self.snapshot_tx.send(snapshot);
    }

    fn shutdown(&mut self) {
        info!("shutting down");
        self.poll_verifications(Utc::now());
        for (&horizon, stats) in &self.tracker.stats.per_horizon {
            info!(
                "accuracy {}m: {}/{} ({:.1}%)",
                horizon,
                stats.correct,
                stats.checked,
                stats.accuracy() * 100.0
            );
        }
        info!(
            "signals emitted: {} ({} buy / {} sell)",
            self.total_signals, self.buy_signals, self.sell_signals
        );
    }

    pub fn signal_history(&self) -> &[TradingSignal] {
        &self.signal_history
    }

    pub fn accuracy(&self) -> &AccuracyStats {
        &self.tracker.stats
    }
}
