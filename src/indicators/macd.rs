use crate::indicators::ema;
use crate::models::SignalDirection;

/// MACD line, signal line, and histogram. Both EMAs are aligned to the slow
/// EMA's warm-up tail and the three returned series share one None prefix
/// that ends where the signal line becomes defined (index
/// `slow + signal - 2`).
#[derive(Debug, Clone)]
pub struct MacdResult {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
    pub latest: Option<MacdValue>,
}

#[derive(Debug, Clone, Copy)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub fn calculate(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdResult {
    let n = closes.len();
    let mut macd_series = vec![None; n];
    let mut signal_series = vec![None; n];
    let mut histogram_series = vec![None; n];

    if fast == 0 || slow == 0 || signal == 0 || fast >= slow || n < slow + signal - 1 {
        return MacdResult {
            macd: macd_series,
            signal: signal_series,
            histogram: histogram_series,
            latest: None,
        };
    }

    let ema_fast = ema::series(closes, fast);
    let ema_slow = ema::series(closes, slow);

    // Raw MACD line from the slow warm-up tail onwards.
    let raw_macd: Vec<f64> = (slow - 1..n)
        .map(|i| ema_fast[i].unwrap_or(0.0) - ema_slow[i].unwrap_or(0.0))
        .collect();
    let signal_on_macd = ema::series(&raw_macd, signal);

    // First index where the signal line exists; everything before stays None
    // so the three series are mutually consistent.
    let start = slow + signal - 2;
    for i in start..n {
        let rel = i - (slow - 1);
        let Some(sig) = signal_on_macd[rel] else {
            continue;
        };
        let line = raw_macd[rel];
        macd_series[i] = Some(line);
        signal_series[i] = Some(sig);
        histogram_series[i] = Some(line - sig);
    }

    let latest = match (
        macd_series.last().copied().flatten(),
        signal_series.last().copied().flatten(),
        histogram_series.last().copied().flatten(),
    ) {
        (Some(macd), Some(signal), Some(histogram)) => Some(MacdValue {
            macd,
            signal,
            histogram,
        }),
        _ => None,
    };

    MacdResult {
        macd: macd_series,
        signal: signal_series,
        histogram: histogram_series,
        latest,
    }
}

/// Crossover signal plus a coarse histogram-magnitude read.
#[derive(Debug, Clone)]
pub struct MacdAnalyzer {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdAnalyzer {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

impl MacdAnalyzer {
    pub fn signal(&self, result: &MacdResult) -> SignalDirection {
        let n = result.macd.len();
        if n < 2 {
            return SignalDirection::Hold;
        }
        let prev = result.macd[n - 2].zip(result.signal[n - 2]);
        let curr = result.macd[n - 1].zip(result.signal[n - 1]);
        let (Some((prev_macd, prev_signal)), Some((macd, signal))) = (prev, curr) else {
            return SignalDirection::Hold;
        };

        if prev_macd < prev_signal && macd > signal {
            SignalDirection::Buy
        } else if prev_macd > prev_signal && macd < signal {
            SignalDirection::Sell
        } else {
            SignalDirection::Hold
        }
    }

    /// Whether the latest histogram bar is large relative to recent history:
    /// at or above the 75th percentile of |histogram| over the last 50 bars.
    pub fn histogram_is_strong(&self, result: &MacdResult) -> bool {
        let Some(latest) = result.latest else {
            return false;
        };
        let mut magnitudes: Vec<f64> = result
            .histogram
            .iter()
            .rev()
            .take(50)
            .copied()
            .flatten()
            .map(f64::abs)
            .collect();
        if magnitudes.len() < 4 {
            return false;
        }
        magnitudes.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let threshold = magnitudes[(magnitudes.len() * 3) / 4];
        latest.histogram.abs() >= threshold
    }

    /// Histogram shrinking toward zero from below (possible bullish cross)
    /// or from above (possible bearish cross).
    pub fn histogram_converging(&self, result: &MacdResult) -> Option<SignalDirection> {
        let n = result.histogram.len();
        if n < 2 {
            return None;
        }
        let (Some(prev), Some(curr)) = (result.histogram[n - 2], result.histogram[n - 1]) else {
            return None;
        };
        if curr < 0.0 && curr > prev {
            Some(SignalDirection::Buy)
        } else if curr > 0.0 && curr < prev {
            Some(SignalDirection::Sell)
        } else {
            None
        }
    }
}
