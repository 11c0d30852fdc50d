use crate::models::VolatilityLevel;

/// Wilder average true range. `TR_0 = high - low`; later bars take
/// `max(high - low, |high - prev_close|, |low - prev_close|)`. The first ATR
/// is the mean of `TR_1..=TR_period`, placed at index `period`, then the
/// Wilder recurrence takes over.
#[derive(Debug, Clone)]
pub struct AtrResult {
    pub latest: Option<f64>,
    pub series: Vec<Option<f64>>,
}

pub fn calculate(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> AtrResult {
    let n = closes.len();
    let mut series = vec![None; n];
    if period == 0 || n < period + 1 || highs.len() != n || lows.len() != n {
        return AtrResult {
            latest: None,
            series,
        };
    }

    let mut true_ranges = Vec::with_capacity(n);
    true_ranges.push(highs[0] - lows[0]);
    for i in 1..n {
        let prev_close = closes[i - 1];
        let tr = (highs[i] - lows[i])
            .max((highs[i] - prev_close).abs())
            .max((lows[i] - prev_close).abs());
        true_ranges.push(tr);
    }

    let mut atr: f64 = true_ranges[1..=period].iter().sum::<f64>() / period as f64;
    series[period] = Some(atr);
    for i in period + 1..n {
        atr = (atr * (period as f64 - 1.0) + true_ranges[i]) / period as f64;
        series[i] = Some(atr);
    }

    AtrResult {
        latest: series.last().copied().flatten(),
        series,
    }
}

#[derive(Debug, Clone)]
pub struct AtrAnalyzer {
    pub period: usize,
    pub stop_loss_multiplier: f64,
}

impl Default for AtrAnalyzer {
    fn default() -> Self {
        Self {
            period: 14,
            stop_loss_multiplier: 2.0,
        }
    }
}

impl AtrAnalyzer {
    /// Latest ATR against its trailing 20-bar average.
    pub fn volatility_level(&self, result: &AtrResult) -> Option<VolatilityLevel> {
        let latest = result.latest?;
        let valid: Vec<f64> = result.series.iter().copied().flatten().collect();
        if valid.len() < 2 {
            return None;
        }
        let tail = &valid[valid.len().saturating_sub(20)..];
        let avg = tail.iter().sum::<f64>() / tail.len() as f64;
        if avg <= 0.0 {
            return Some(VolatilityLevel::Low);
        }
        let ratio = latest / avg;
        Some(if ratio > 1.5 {
            VolatilityLevel::VeryHigh
        } else if ratio > 1.2 {
            VolatilityLevel::High
        } else if ratio > 0.8 {
            VolatilityLevel::Medium
        } else {
            VolatilityLevel::Low
        })
    }

    pub fn stop_loss_distance(&self, result: &AtrResult) -> Option<f64> {
        result.latest.map(|atr| atr * self.stop_loss_multiplier)
    }

    /// Latest ATR above the mean of the previous three by the given factor.
    pub fn is_expanding(&self, result: &AtrResult, threshold: f64) -> bool {
        let valid: Vec<f64> = result.series.iter().copied().flatten().collect();
        if valid.len() < 3 {
            return false;
        }
        let recent = valid[valid.len() - 1];
        let prev_avg = if valid.len() >= 4 {
            valid[valid.len() - 4..valid.len() - 1].iter().sum::<f64>() / 3.0
        } else {
            valid[valid.len() - 2]
        };
        recent > prev_avg * threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_true_range_is_exact() {
        // Every bar spans exactly 1.0 and closes mid-bar, so TR_i = 1.0 and
        // ATR must be exactly 1.0 from index `period` onwards.
        let n = 40;
        let highs: Vec<f64> = (0..n).map(|_| 100.5).collect();
        let lows: Vec<f64> = (0..n).map(|_| 99.5).collect();
        let closes: Vec<f64> = (0..n).map(|_| 100.0).collect();
        let result = calculate(&highs, &lows, &closes, 14);
        for i in 0..14 {
            assert!(result.series[i].is_none());
        }
        for i in 14..n {
            assert!((result.series[i].unwrap() - 1.0).abs() < 1e-12, "at {}", i);
        }
    }

    #[test]
    fn gap_uses_prev_close() {
        // Second bar gaps above the first close; TR must use |high - prev_close|.
        let highs = vec![10.0, 20.0, 20.5];
        let lows = vec![9.0, 19.0, 19.5];
        let closes = vec![9.5, 19.5, 20.0];
        let result = calculate(&highs, &lows, &closes, 2);
        // TR_1 = max(1.0, |20 - 9.5|, |19 - 9.5|) = 10.5; TR_2 = 1.0
        // ATR_2 = (10.5 + 1.0) / 2 = 5.75
        assert!((result.series[2].unwrap() - 5.75).abs() < 1e-12);
    }

    #[test]
    fn incremental_equals_batch() {
        let highs: Vec<f64> = (0..60).map(|i| 101.0 + (i as f64 * 0.37).sin() * 4.0).collect();
        let lows: Vec<f64> = highs.iter().map(|h| h - 2.0 - (h % 1.0)).collect();
        let closes: Vec<f64> = highs.iter().zip(&lows).map(|(h, l)| (h + l) / 2.0).collect();
        let full = calculate(&highs, &lows, &closes, 14);
        for i in 14..60 {
            let prefix = calculate(&highs[..=i], &lows[..=i], &closes[..=i], 14);
            assert!(
                (prefix.latest.unwrap() - full.series[i].unwrap()).abs() < 1e-9,
                "mismatch at {}",
                i
            );
        }
    }

    #[test]
    fn volatility_level_against_trailing_average() {
        let analyzer = AtrAnalyzer::default();
        let n = 40;
        let closes: Vec<f64> = (0..n).map(|_| 100.0).collect();

        // Flat tape: latest ATR equals its trailing average.
        let quiet = calculate(&vec![100.5; n], &vec![99.5; n], &closes, 14);
        assert_eq!(
            analyzer.volatility_level(&quiet),
            Some(VolatilityLevel::Medium)
        );

        // One wide bar at the end pushes the ratio above 1.5.
        let mut highs = vec![100.5; n];
        let mut lows = vec![99.5; n];
        highs[n - 1] = 115.0;
        lows[n - 1] = 85.0;
        let burst = calculate(&highs, &lows, &closes, 14);
        assert_eq!(
            analyzer.volatility_level(&burst),
            Some(VolatilityLevel::VeryHigh)
        );
    }

    #[test]
    fn stop_loss_distance_uses_multiplier() {
        let analyzer = AtrAnalyzer::default();
        let n = 40;
        let closes: Vec<f64> = (0..n).map(|_| 100.0).collect();
        let result = calculate(&vec![100.5; n], &vec![99.5; n], &closes, 14);
        // ATR is exactly 1.0 here, multiplier 2.0.
        assert!((analyzer.stop_loss_distance(&result).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn expansion_detection() {
        let n = 30;
        let mut highs: Vec<f64> = (0..n).map(|_| 100.5).collect();
        let mut lows: Vec<f64> = (0..n).map(|_| 99.5).collect();
        let closes: Vec<f64> = (0..n).map(|_| 100.0).collect();
        // Volatility burst on the last bar.
        highs[n - 1] = 110.0;
        lows[n - 1] = 90.0;
        let result = calculate(&highs, &lows, &closes, 14);
        let analyzer = AtrAnalyzer::default();
        assert!(analyzer.is_expanding(&result, 1.3));

        let quiet = calculate(&vec![100.5; n], &vec![99.5; n], &closes, 14);
        assert!(!analyzer.is_expanding(&quiet, 1.3));
    }
}
