use std::collections::VecDeque;

use crate::models::candle::{Candle, PriceArrays};

/// Reconciles incremental kline pushes into a consistent series: a bounded
/// ring of closed candles plus at most one active (unsealed) candle.
///
/// The exchange re-sends the same bar many times while it is open, and may
/// replay already-closed bars after a reconnect. `update` absorbs both.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    closed: VecDeque<Candle>,
    active: Option<Candle>,
    last_closed_time: Option<i64>,
    max_closed: usize,
}

impl CandleBuffer {
    pub fn new(max_closed: usize) -> Self {
        Self {
            closed: VecDeque::with_capacity(max_closed),
            active: None,
            last_closed_time: None,
            max_closed,
        }
    }

    /// Apply one tick. Never fails: malformed frames are rejected by the
    /// transport parser before they get here.
    pub fn update(&mut self, tick: Candle) {
        // Replayed closed bar after reconnect: drop.
        if tick.is_closed {
            if let Some(last) = self.last_closed_time {
                if tick.open_time <= last {
                    return;
                }
            }
        }

        match &mut self.active {
            Some(active) if active.open_time == tick.open_time => {
                active.merge(&tick);
            }
            _ => {
                // New open_time: the prior active bar is final even if we
                // never saw its is_closed push.
                self.seal_active();
                self.active = Some(tick);
            }
        }

        if self.active.as_ref().is_some_and(|c| c.is_closed) {
            self.seal_active();
        }
    }

    fn seal_active(&mut self) {
        let Some(mut candle) = self.active.take() else {
            return;
        };
        candle.is_closed = true;
        self.last_closed_time = Some(candle.open_time);
        if self.closed.len() == self.max_closed {
            self.closed.pop_front();
        }
        self.closed.push_back(candle);
    }

    pub fn get_price_arrays(&self, include_active: bool) -> PriceArrays {
        let active = if include_active {
            self.active.as_ref()
        } else {
            None
        };
        PriceArrays::from_candles(self.closed.iter().chain(active))
    }

    /// Snapshot of the candles, cloned so readers never hold interior refs.
    pub fn get_candles(&self, include_active: bool) -> Vec<Candle> {
        let mut candles: Vec<Candle> = self.closed.iter().cloned().collect();
        if include_active {
            if let Some(active) = &self.active {
                candles.push(active.clone());
            }
        }
        candles
    }

    /// Open time of the bar the next signal would be attributed to.
    pub fn current_open_time(&self) -> Option<i64> {
        self.active
            .as_ref()
            .map(|c| c.open_time)
            .or(self.last_closed_time)
    }

    pub fn closed_len(&self) -> usize {
        self.closed.len()
    }

    pub fn len(&self) -> usize {
        self.closed.len() + usize::from(self.active.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_closed_time(&self) -> Option<i64> {
        self.last_closed_time
    }

    pub fn active(&self) -> Option<&Candle> {
        self.active.as_ref()
    }
}
