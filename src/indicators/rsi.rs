use crate::models::{MomentumLevel, SignalDirection};

/// Wilder RSI. Average gain/loss are seeded with simple means over the first
/// `period` close-to-close diffs, then updated with
/// `avg = (prev * (period - 1) + current) / period`.
#[derive(Debug, Clone)]
pub struct RsiResult {
    pub latest: Option<f64>,
    pub series: Vec<Option<f64>>,
}

pub fn calculate(closes: &[f64], period: usize) -> RsiResult {
    let n = closes.len();
    let mut series = vec![None; n];
    if period == 0 || n < period + 1 {
        return RsiResult {
            latest: None,
            series,
        };
    }

    let mut gains = Vec::with_capacity(n - 1);
    let mut losses = Vec::with_capacity(n - 1);
    for w in closes.windows(2) {
        let diff = w[1] - w[0];
        gains.push(diff.max(0.0));
        losses.push((-diff).max(0.0));
    }

    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;
    series[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period as f64 - 1.0) + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + losses[i]) / period as f64;
        series[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    RsiResult {
        latest: series.last().copied().flatten(),
        series,
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    Bullish,
    Bearish,
}

/// Maps an RSI result to a coarse signal: BUY when RSI crosses back up
/// through the oversold threshold, SELL when it falls back through the
/// overbought threshold.
#[derive(Debug, Clone)]
pub struct RsiAnalyzer {
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for RsiAnalyzer {
    fn default() -> Self {
        Self {
            period: 14,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

impl RsiAnalyzer {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Self {
        Self {
            period,
            overbought,
            oversold,
        }
    }

    pub fn signal(&self, result: &RsiResult) -> SignalDirection {
        let n = result.series.len();
        if n < 2 {
            return SignalDirection::Hold;
        }
        let (Some(prev), Some(curr)) = (result.series[n - 2], result.series[n - 1]) else {
            return SignalDirection::Hold;
        };

        if prev <= self.oversold && curr > self.oversold {
            SignalDirection::Buy
        } else if prev >= self.overbought && curr < self.overbought {
            SignalDirection::Sell
        } else {
            SignalDirection::Hold
        }
    }

    pub fn momentum_level(&self, rsi: f64) -> MomentumLevel {
        if rsi > self.overbought {
            MomentumLevel::Overbought
        } else if rsi > 50.0 {
            MomentumLevel::Bullish
        } else if rsi < self.oversold {
            MomentumLevel::Oversold
        } else if rsi < 50.0 {
            MomentumLevel::Bearish
        } else {
            MomentumLevel::Neutral
        }
    }

    /// Price making a move the RSI does not follow over the lookback window.
    pub fn divergence(&self, closes: &[f64], lookback: usize) -> Option<Divergence> {
        if closes.len() < self.period + lookback + 1 {
            return None;
        }
        let result = calculate(closes, self.period);
        let rsi_window: Vec<f64> = result.series[closes.len() - lookback..]
            .iter()
            .copied()
            .flatten()
            .collect();
        if rsi_window.len() < 2 {
            return None;
        }

        let price_trend = closes[closes.len() - 1] - closes[closes.len() - lookback];
        let rsi_trend = rsi_window[rsi_window.len() - 1] - rsi_window[0];

        if price_trend < 0.0 && rsi_trend > 0.0 {
            Some(Divergence::Bullish)
        } else if price_trend > 0.0 && rsi_trend < 0.0 {
            Some(Divergence::Bearish)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_is_period_nones() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let result = calculate(&closes, 14);
        for i in 0..14 {
            assert!(result.series[i].is_none(), "expected None at {}", i);
        }
        assert!(result.series[14].is_some());
    }

    #[test]
    fn all_gains_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let result = calculate(&closes, 14);
        assert!((result.latest.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn all_losses_is_0() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let result = calculate(&closes, 14);
        assert!(result.latest.unwrap().abs() < 1e-9);
    }

    #[test]
    fn incremental_equals_batch() {
        let closes: Vec<f64> = (0..80)
            .map(|i| 100.0 + (i as f64 * 0.31).sin() * 4.0 + (i as f64 * 0.07).cos())
            .collect();
        let full = calculate(&closes, 14);
        for i in 14..closes.len() {
            let prefix = calculate(&closes[..=i], 14);
            let a = prefix.latest.unwrap();
            let b = full.series[i].unwrap();
            assert!((a - b).abs() < 1e-9, "mismatch at {}: {} vs {}", i, a, b);
        }
    }

    #[test]
    fn oversold_rebound_is_buy() {
        // Fall hard enough to push RSI below 30, then bounce through it.
        let mut closes: Vec<f64> = vec![100.0];
        for _ in 0..25 {
            closes.push(closes.last().unwrap() - 1.0);
        }
        closes.push(closes.last().unwrap() + 6.0);

        let analyzer = RsiAnalyzer::default();
        let result = calculate(&closes, 14);
        let n = result.series.len();
        assert!(result.series[n - 2].unwrap() <= 30.0);
        assert!(result.series[n - 1].unwrap() > 30.0);
        assert_eq!(analyzer.signal(&result), SignalDirection::Buy);
    }

    #[test]
    fn momentum_levels() {
        let analyzer = RsiAnalyzer::default();
        assert_eq!(analyzer.momentum_level(80.0), MomentumLevel::Overbought);
        assert_eq!(analyzer.momentum_level(60.0), MomentumLevel::Bullish);
        assert_eq!(analyzer.momentum_level(50.0), MomentumLevel::Neutral);
        assert_eq!(analyzer.momentum_level(40.0), MomentumLevel::Bearish);
        assert_eq!(analyzer.momentum_level(20.0), MomentumLevel::Oversold);
    }

    #[test]
    fn bearish_divergence_detected() {
        // Choppy base, one momentum spike, then a net-positive drift the RSI
        // does not follow: price trend up, RSI trend down over the window.
        let mut closes: Vec<f64> = Vec::new();
        let mut price = 100.0;
        closes.push(price);
        for i in 0..20 {
            price += if i % 2 == 0 { 1.0 } else { -1.0 };
            closes.push(price);
        }
        price += 50.0;
        closes.push(price); // spike, RSI near its high here
        for step in [-1.0, 1.1, -1.0, 1.1] {
            price += step;
            closes.push(price);
        }

        let analyzer = RsiAnalyzer::default();
        assert_eq!(analyzer.divergence(&closes, 5), Some(Divergence::Bearish));
    }

    #[test]
    fn flat_series_has_no_divergence() {
        let closes = vec![100.0; 40];
        let analyzer = RsiAnalyzer::default();
        assert_eq!(analyzer.divergence(&closes, 5), None);
    }
}
