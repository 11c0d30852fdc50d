use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, epoch milliseconds.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_closed: bool,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn total_range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Merge a newer update for the same open_time. The exchange pushes the
    /// cumulative interval volume, so the last value wins.
    pub fn merge(&mut self, tick: &Candle) {
        self.high = self.high.max(tick.high);
        self.low = self.low.min(tick.low);
        self.close = tick.close;
        self.volume = tick.volume;
        self.is_closed = tick.is_closed;
    }
}

/// Column view over a candle sequence, the only shape indicator kernels see.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceArrays {
    pub opens: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl PriceArrays {
    pub fn from_candles<'a>(candles: impl Iterator<Item = &'a Candle>) -> Self {
        let mut arrays = PriceArrays::default();
        for c in candles {
            arrays.opens.push(c.open);
            arrays.highs.push(c.high);
            arrays.lows.push(c.low);
            arrays.closes.push(c.close);
            arrays.volumes.push(c.volume);
        }
        arrays
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open_time: 0,
            open,
            high,
            low,
            close,
            volume: 10.0,
            is_closed: false,
        }
    }

    #[test]
    fn body_and_range() {
        let c = candle(100.0, 115.0, 95.0, 110.0);
        assert!((c.body() - 10.0).abs() < 1e-9);
        assert!((c.total_range() - 20.0).abs() < 1e-9);
        assert!(c.is_bullish());
        assert!(!c.is_bearish());
    }

    #[test]
    fn merge_takes_extremes_and_last_close() {
        let mut c = candle(100.0, 105.0, 99.0, 101.0);
        let mut update = candle(100.0, 108.0, 98.0, 104.0);
        update.volume = 25.0;
        c.merge(&update);
        assert!((c.high - 108.0).abs() < 1e-9);
        assert!((c.low - 98.0).abs() < 1e-9);
        assert!((c.close - 104.0).abs() < 1e-9);
        // cumulative volume: last value wins, no summing
        assert!((c.volume - 25.0).abs() < 1e-9);
        assert!((c.open - 100.0).abs() < 1e-9);
    }

    #[test]
    fn price_arrays_columns() {
        let candles = vec![candle(1.0, 2.0, 0.5, 1.5), candle(1.5, 3.0, 1.0, 2.5)];
        let arrays = PriceArrays::from_candles(candles.iter());
        assert_eq!(arrays.len(), 2);
        assert_eq!(arrays.closes, vec![1.5, 2.5]);
        assert_eq!(arrays.highs, vec![2.0, 3.0]);
        assert_eq!(arrays.last_close(), Some(2.5));
    }
}
