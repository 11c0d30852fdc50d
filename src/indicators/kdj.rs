use crate::models::{MomentumLevel, SignalDirection};

/// KDJ in the TradingView `bcwsma` formulation.
///
/// `RSV = 100 * (close - lowest(low, n)) / (highest(high, n) - lowest(low, n))`
/// with a flat window mapping to 50. K and D are both
/// `x_i = (1 * s_i + (smooth - 1) * x_{i-1}) / smooth` seeded at 50. The seed
/// and the weight-1 recurrence are what make this match the reference; a
/// generic EMA here drifts.
#[derive(Debug, Clone)]
pub struct KdjResult {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
    pub j: Vec<Option<f64>>,
    pub latest: Option<KdjValue>,
}

#[derive(Debug, Clone, Copy)]
pub struct KdjValue {
    pub k: f64,
    pub d: f64,
    pub j: f64,
}

pub fn calculate(highs: &[f64], lows: &[f64], closes: &[f64], period: usize, smooth: usize) -> KdjResult {
    let n = closes.len();
    let mut k_series = vec![None; n];
    let mut d_series = vec![None; n];
    let mut j_series = vec![None; n];

    if period == 0 || smooth == 0 || n < period || highs.len() != n || lows.len() != n {
        return KdjResult {
            k: k_series,
            d: d_series,
            j: j_series,
            latest: None,
        };
    }

    let mut k = 50.0;
    let mut d = 50.0;
    for i in period - 1..n {
        let window_high = highs[i + 1 - period..=i]
            .iter()
            .fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let window_low = lows[i + 1 - period..=i]
            .iter()
            .fold(f64::INFINITY, |a, &b| a.min(b));

        let rsv = if window_high != window_low {
            100.0 * (closes[i] - window_low) / (window_high - window_low)
        } else {
            50.0
        };

        k = (rsv + (smooth as f64 - 1.0) * k) / smooth as f64;
        d = (k + (smooth as f64 - 1.0) * d) / smooth as f64;

        k_series[i] = Some(k);
        d_series[i] = Some(d);
        j_series[i] = Some(3.0 * k - 2.0 * d);
    }

    let latest = match (
        k_series.last().copied().flatten(),
        d_series.last().copied().flatten(),
        j_series.last().copied().flatten(),
    ) {
        (Some(k), Some(d), Some(j)) => Some(KdjValue { k, d, j }),
        _ => None,
    };

    KdjResult {
        k: k_series,
        d: d_series,
        j: j_series,
        latest,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdjSignal {
    pub direction: SignalDirection,
    /// Cross happened inside the oversold/overbought zone.
    pub strong: bool,
}

#[derive(Debug, Clone)]
pub struct KdjAnalyzer {
    pub period: usize,
    pub smooth: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for KdjAnalyzer {
    fn default() -> Self {
        Self {
            period: 9,
            smooth: 3,
            oversold: 20.0,
            overbought: 80.0,
        }
    }
}

impl KdjAnalyzer {
    pub fn signal(&self, result: &KdjResult) -> KdjSignal {
        let n = result.k.len();
        let hold = KdjSignal {
            direction: SignalDirection::Hold,
            strong: false,
        };
        if n < 2 {
            return hold;
        }
        let prev = result.k[n - 2].zip(result.d[n - 2]);
        let curr = result.k[n - 1].zip(result.d[n - 1]);
        let (Some((prev_k, prev_d)), Some((k, d))) = (prev, curr) else {
            return hold;
        };

        if prev_k <= prev_d && k > d {
            KdjSignal {
                direction: SignalDirection::Buy,
                strong: k < self.oversold || d < self.oversold,
            }
        } else if prev_k >= prev_d && k < d {
            KdjSignal {
                direction: SignalDirection::Sell,
                strong: k > self.overbought || d > self.overbought,
            }
        } else {
            hold
        }
    }

    pub fn momentum_level(&self, value: &KdjValue) -> MomentumLevel {
        if value.k > self.overbought && value.d > self.overbought {
            MomentumLevel::Overbought
        } else if value.k < self.oversold && value.d < self.oversold {
            MomentumLevel::Oversold
        } else if value.k > 50.0 && value.d > 50.0 {
            MomentumLevel::Bullish
        } else if value.k < 50.0 && value.d < 50.0 {
            MomentumLevel::Bearish
        } else {
            MomentumLevel::Neutral
        }
    }

    /// All three lines pinned in a zone reads as a strong tone; K and D on
    /// one side of the midline as an ordinary one.
    pub fn trend_tone(&self, value: &KdjValue) -> KdjTone {
        if value.k > self.overbought && value.d > self.overbought && value.j > self.overbought {
            KdjTone::StrongBullish
        } else if value.k < self.oversold && value.d < self.oversold && value.j < self.oversold {
            KdjTone::StrongBearish
        } else if value.k > 50.0 && value.d > 50.0 {
            KdjTone::Bullish
        } else if value.k < 50.0 && value.d < 50.0 {
            KdjTone::Bearish
        } else {
            KdjTone::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdjTone {
    StrongBullish,
    Bullish,
    Neutral,
    Bearish,
    StrongBearish,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_market_pins_to_50() {
        // RSV is 0/0 here; the formula maps it to 50 and the recurrences
        // then hold K = D = 50, J = 50, with no panic.
        let highs = vec![100.0; 40];
        let lows = vec![100.0; 40];
        let closes = vec![100.0; 40];
        let result = calculate(&highs, &lows, &closes, 9, 3);
        for i in 8..40 {
            assert!((result.k[i].unwrap() - 50.0).abs() < 1e-12);
            assert!((result.d[i].unwrap() - 50.0).abs() < 1e-12);
            assert!((result.j[i].unwrap() - 50.0).abs() < 1e-12);
        }
    }

    #[test]
    fn warm_up_prefix() {
        let highs: Vec<f64> = (0..20).map(|i| 101.0 + i as f64).collect();
        let lows: Vec<f64> = (0..20).map(|i| 99.0 + i as f64).collect();
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let result = calculate(&highs, &lows, &closes, 9, 3);
        for i in 0..8 {
            assert!(result.k[i].is_none());
        }
        assert!(result.k[8].is_some());
        assert_eq!(result.j.len(), 20);
    }

    #[test]
    fn j_is_3k_minus_2d() {
        let highs: Vec<f64> = (0..30).map(|i| 102.0 + (i as f64 * 0.5).sin() * 3.0).collect();
        let lows: Vec<f64> = highs.iter().map(|h| h - 4.0).collect();
        let closes: Vec<f64> = highs.iter().map(|h| h - 2.0 + (h % 1.0)).collect();
        let result = calculate(&highs, &lows, &closes, 9, 3);
        for i in 0..30 {
            if let (Some(k), Some(d), Some(j)) = (result.k[i], result.d[i], result.j[i]) {
                assert!((j - (3.0 * k - 2.0 * d)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn incremental_equals_batch() {
        let highs: Vec<f64> = (0..50).map(|i| 102.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let lows: Vec<f64> = highs.iter().map(|h| h - 3.0).collect();
        let closes: Vec<f64> = highs.iter().map(|h| h - 1.5).collect();
        let full = calculate(&highs, &lows, &closes, 9, 3);
        for i in 8..50 {
            let prefix = calculate(&highs[..=i], &lows[..=i], &closes[..=i], 9, 3);
            let a = prefix.latest.unwrap();
            assert!((a.k - full.k[i].unwrap()).abs() < 1e-9, "k mismatch at {}", i);
            assert!((a.d - full.d[i].unwrap()).abs() < 1e-9, "d mismatch at {}", i);
        }
    }

    #[test]
    fn trend_tone_buckets() {
        let analyzer = KdjAnalyzer::default();
        let strong = KdjValue {
            k: 85.0,
            d: 82.0,
            j: 91.0,
        };
        assert_eq!(analyzer.trend_tone(&strong), KdjTone::StrongBullish);
        let bull = KdjValue {
            k: 60.0,
            d: 55.0,
            j: 70.0,
        };
        assert_eq!(analyzer.trend_tone(&bull), KdjTone::Bullish);
        let bear = KdjValue {
            k: 40.0,
            d: 45.0,
            j: 30.0,
        };
        assert_eq!(analyzer.trend_tone(&bear), KdjTone::Bearish);
        let mixed = KdjValue {
            k: 55.0,
            d: 45.0,
            j: 75.0,
        };
        assert_eq!(analyzer.trend_tone(&mixed), KdjTone::Neutral);
    }

    #[test]
    fn golden_cross_in_oversold_zone_is_strong() {
        // Grind down to push K and D low, then one strong up bar.
        let mut highs = Vec::new();
        let mut lows = Vec::new();
        let mut closes = Vec::new();
        for i in 0..25 {
            let base = 100.0 - i as f64 * 2.0;
            highs.push(base + 1.0);
            lows.push(base - 1.0);
            closes.push(base - 0.5);
        }
        highs.push(60.0);
        lows.push(49.0);
        closes.push(59.5);

        let analyzer = KdjAnalyzer::default();
        let result = calculate(&highs, &lows, &closes, 9, 3);
        let signal = analyzer.signal(&result);
        assert_eq!(signal.direction, SignalDirection::Buy);
        assert!(signal.strong);
    }
}
