use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{SignalDirection, VerificationOutcome};
use crate::strategy::TradingSignal;

/// One resolved horizon probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonResult {
    pub price: f64,
    pub outcome: VerificationOutcome,
    pub profit_pct: f64,
}

/// A signal waiting for its horizons to come due. Holds only the flat facts
/// the probes need, not the whole signal history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingVerification {
    pub signal_id: String,
    pub direction: SignalDirection,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub check_times: HashMap<u16, DateTime<Utc>>,
    pub results: HashMap<u16, HorizonResult>,
}

impl PendingVerification {
    pub fn is_fully_resolved(&self) -> bool {
        self.results.len() == self.check_times.len()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HorizonStats {
    pub checked: u64,
    pub correct: u64,
}

impl HorizonStats {
    /// `correct / checked`, with the 0/0 convention of 0.
    pub fn accuracy(&self) -> f64 {
        if self.checked == 0 {
            0.0
        } else {
            self.correct as f64 / self.checked as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub per_horizon: HashMap<u16, HorizonStats>,
}

impl AccuracyStats {
    pub fn horizon(&self, horizon: u16) -> HorizonStats {
        self.per_horizon.get(&horizon).copied().unwrap_or_default()
    }
}

/// A probe resolution, reported back so the caller can log it.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub signal_id: String,
    pub horizon_minutes: u16,
    pub direction: SignalDirection,
    pub entry_price: f64,
    pub price: f64,
    pub profit_pct: f64,
    pub outcome: VerificationOutcome,
}

/// Tracks emitted signals through their verification windows and keeps the
/// running accuracy book.
pub struct VerificationTracker {
    horizons: Vec<u16>,
    pending_cap: usize,
    pub pending: Vec<PendingVerification>,
    pub completed: Vec<PendingVerification>,
    pub stats: AccuracyStats,
    last_direction: Option<SignalDirection>,
    last_open_time: Option<i64>,
}

impl VerificationTracker {
    pub fn new(horizons: Vec<u16>, pending_cap: usize) -> Self {
        Self {
            horizons,
            pending_cap,
            pending: Vec::new(),
            completed: Vec::new(),
            stats: AccuracyStats::default(),
            last_direction: None,
            last_open_time: None,
        }
    }

    /// Register an emitted signal. Repeated same-direction emissions within
    /// one bar are collapsed into the first record; a HOLD clears the memory
    /// so a later non-HOLD in the same bar tracks again.
    pub fn track(&mut self, signal: &TradingSignal, candle_open_time: Option<i64>) -> bool {
        if signal.direction == SignalDirection::Hold {
            self.last_direction = None;
            return false;
        }

        let duplicate = self.last_direction == Some(signal.direction)
            && self.last_open_time == candle_open_time;
        if duplicate {
            return false;
        }
        self.last_direction = Some(signal.direction);
        self.last_open_time = candle_open_time;

        let check_times = self
            .horizons
            .iter()
            .map(|&h| (h, signal.timestamp + Duration::seconds(h as i64 * 60)))
            .collect();

        if self.pending.len() >= self.pending_cap {
            // Evict the oldest fully resolved record first; only push out a
            // live one when everything is still open.
            if let Some(pos) = self.pending.iter().position(|p| p.is_fully_resolved()) {
                let resolved = self.pending.remove(pos);
                self.push_completed(resolved);
            } else {
                self.pending.remove(0);
            }
        }

        self.pending.push(PendingVerification {
            signal_id: signal.id.clone(),
            direction: signal.direction,
            entry_price: signal.entry_price,
            entry_time: signal.timestamp,
            check_times,
            results: HashMap::new(),
        });
        true
    }

    /// Probe every pending record against the newest close. Each horizon is
    /// resolved exactly once, at or after its check time.
    pub fn poll(&mut self, now: DateTime<Utc>, current_price: f64) -> Vec<Resolution> {
        let mut resolutions = Vec::new();
        if current_price <= 0.0 {
            return resolutions;
        }

        for pv in &mut self.pending {
            for (&horizon, &check_time) in &pv.check_times.clone() {
                if pv.results.contains_key(&horizon) || now < check_time {
                    continue;
                }

                let raw_pct = (current_price - pv.entry_price) / pv.entry_price * 100.0;
                let profit_pct = match pv.direction {
                    SignalDirection::Sell => -raw_pct,
                    _ => raw_pct,
                };
                // Strict inequality: an unchanged price counts as wrong.
                let correct = match pv.direction {
                    SignalDirection::Buy => current_price > pv.entry_price,
                    SignalDirection::Sell => current_price < pv.entry_price,
                    SignalDirection::Hold => false,
                };
                let outcome = if correct {
                    VerificationOutcome::Correct
                } else {
                    VerificationOutcome::Wrong
                };

                pv.results.insert(
                    horizon,
                    HorizonResult {
                        price: current_price,
                        outcome,
                        profit_pct,
                    },
                );

                let entry = self.stats.per_horizon.entry(horizon).or_default();
                entry.checked += 1;
                if correct {
                    entry.correct += 1;
                }

                resolutions.push(Resolution {
                    signal_id: pv.signal_id.clone(),
                    horizon_minutes: horizon,
                    direction: pv.direction,
                    entry_price: pv.entry_price,
                    price: current_price,
                    profit_pct,
                    outcome,
                });
            }
        }

        let (done, open): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(PendingVerification::is_fully_resolved);
        self.pending = open;
        for record in done {
            self.push_completed(record);
        }

        resolutions
    }

    fn push_completed(&mut self, record: PendingVerification) {
        self.completed.push(record);
        if self.completed.len() > 100 {
            self.completed.remove(0);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
