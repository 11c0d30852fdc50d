use crate::models::{TrendDirection, TrendStrength};

/// Wilder ADX with +DI / -DI.
///
/// TR and the directional movements exist from the second bar; Wilder
/// smoothing seeds with an SMA, so +DI/-DI/DX first appear at input index
/// `period` and ADX (a second smoothing pass over DX) at `2 * period - 1`.
#[derive(Debug, Clone)]
pub struct AdxResult {
    pub adx: Vec<Option<f64>>,
    pub plus_di: Vec<Option<f64>>,
    pub minus_di: Vec<Option<f64>>,
    pub dx: Vec<Option<f64>>,
    pub latest_adx: Option<f64>,
    pub latest_plus_di: Option<f64>,
    pub latest_minus_di: Option<f64>,
}

fn wilder_smooth(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];
    if period == 0 || n < period {
        return result;
    }
    let mut smoothed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(smoothed);
    for i in period..n {
        smoothed = (smoothed * (period as f64 - 1.0) + values[i]) / period as f64;
        result[i] = Some(smoothed);
    }
    result
}

pub fn calculate(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> AdxResult {
    let n = closes.len();
    let empty = AdxResult {
        adx: vec![None; n],
        plus_di: vec![None; n],
        minus_di: vec![None; n],
        dx: vec![None; n],
        latest_adx: None,
        latest_plus_di: None,
        latest_minus_di: None,
    };
    if period == 0 || n < 2 || highs.len() != n || lows.len() != n {
        return empty;
    }

    // Per-bar TR / +DM / -DM, one entry per input index >= 1.
    let mut tr = Vec::with_capacity(n - 1);
    let mut plus_dm = Vec::with_capacity(n - 1);
    let mut minus_dm = Vec::with_capacity(n - 1);
    for i in 1..n {
        let range = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        tr.push(range);

        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];
        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
    }

    let smoothed_tr = wilder_smooth(&tr, period);
    let smoothed_plus = wilder_smooth(&plus_dm, period);
    let smoothed_minus = wilder_smooth(&minus_dm, period);

    let mut plus_di = vec![None; n];
    let mut minus_di = vec![None; n];
    let mut dx = vec![None; n];
    for rel in 0..tr.len() {
        let i = rel + 1;
        let (Some(str_), Some(spdm), Some(smdm)) =
            (smoothed_tr[rel], smoothed_plus[rel], smoothed_minus[rel])
        else {
            continue;
        };
        if str_ <= 0.0 {
            continue;
        }
        let pdi = 100.0 * spdm / str_;
        let mdi = 100.0 * smdm / str_;
        plus_di[i] = Some(pdi);
        minus_di[i] = Some(mdi);
        let di_sum = pdi + mdi;
        dx[i] = Some(if di_sum > 0.0 {
            100.0 * (pdi - mdi).abs() / di_sum
        } else {
            0.0
        });
    }

    // Second Wilder pass over the defined DX values gives ADX.
    let mut adx = vec![None; n];
    let dx_start = dx.iter().position(Option::is_some);
    if let Some(start) = dx_start {
        let dx_values: Vec<f64> = dx[start..].iter().copied().flatten().collect();
        let smoothed_dx = wilder_smooth(&dx_values, period);
        for (rel, value) in smoothed_dx.into_iter().enumerate() {
            if let Some(v) = value {
                adx[start + rel] = Some(v);
            }
        }
    }

    AdxResult {
        latest_adx: adx.last().copied().flatten(),
        latest_plus_di: plus_di.last().copied().flatten(),
        latest_minus_di: minus_di.last().copied().flatten(),
        adx,
        plus_di,
        minus_di,
        dx,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiCrossover {
    Bullish,
    Bearish,
}

/// ADX result plus derived trend reads used by the state classifier.
#[derive(Debug, Clone)]
pub struct AdxAnalysis {
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub trend_strength: TrendStrength,
    pub trend_direction: TrendDirection,
    pub is_trending: bool,
    pub adx_rising: Option<bool>,
    pub di_crossover: Option<DiCrossover>,
    pub result: AdxResult,
}

#[derive(Debug, Clone)]
pub struct AdxAnalyzer {
    pub period: usize,
    pub no_trend_threshold: f64,
    pub weak_threshold: f64,
    pub moderate_threshold: f64,
    pub strong_threshold: f64,
}

impl Default for AdxAnalyzer {
    fn default() -> Self {
        Self {
            period: 14,
            no_trend_threshold: 20.0,
            weak_threshold: 25.0,
            moderate_threshold: 40.0,
            strong_threshold: 50.0,
        }
    }
}

impl AdxAnalyzer {
    pub fn analyze(&self, highs: &[f64], lows: &[f64], closes: &[f64]) -> AdxAnalysis {
        let result = calculate(highs, lows, closes, self.period);

        let adx = result.latest_adx;
        let trend_strength = match adx {
            Some(v) => self.trend_strength(v),
            None => TrendStrength::NoTrend,
        };

        let trend_direction = match (result.latest_plus_di, result.latest_minus_di) {
            (Some(p), Some(m)) if p > m => TrendDirection::Up,
            (Some(p), Some(m)) if m > p => TrendDirection::Down,
            _ => TrendDirection::None,
        };

        let valid_adx: Vec<f64> = result.adx.iter().copied().flatten().collect();
        let adx_rising = if valid_adx.len() >= 2 {
            Some(valid_adx[valid_adx.len() - 1] > valid_adx[valid_adx.len() - 2])
        } else {
            None
        };

        let di_crossover = self.detect_di_crossover(&result);
        let is_trending = adx.map(|v| v >= self.no_trend_threshold).unwrap_or(false);

        AdxAnalysis {
            adx,
            plus_di: result.latest_plus_di,
            minus_di: result.latest_minus_di,
            trend_strength,
            trend_direction,
            is_trending,
            adx_rising,
            di_crossover,
            result,
        }
    }

    fn trend_strength(&self, adx: f64) -> TrendStrength {
        if adx < self.no_trend_threshold {
            TrendStrength::NoTrend
        } else if adx < self.weak_threshold {
            TrendStrength::Weak
        } else if adx < self.moderate_threshold {
            TrendStrength::Moderate
        } else if adx < self.strong_threshold {
            TrendStrength::Strong
        } else {
            TrendStrength::VeryStrong
        }
    }

    fn detect_di_crossover(&self, result: &AdxResult) -> Option<DiCrossover> {
        let pairs: Vec<(f64, f64)> = result
            .plus_di
            .iter()
            .zip(result.minus_di.iter())
            .filter_map(|(p, m)| p.zip(*m))
            .collect();
        if pairs.len() < 2 {
            return None;
        }
        let (prev_plus, prev_minus) = pairs[pairs.len() - 2];
        let (plus, minus) = pairs[pairs.len() - 1];

        if prev_plus <= prev_minus && plus > minus {
            Some(DiCrossover::Bullish)
        } else if prev_plus >= prev_minus && plus < minus {
            Some(DiCrossover::Bearish)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_up(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let highs: Vec<f64> = (0..n).map(|i| 101.0 + i as f64 * 2.0).collect();
        let lows: Vec<f64> = (0..n).map(|i| 99.0 + i as f64 * 2.0).collect();
        let closes: Vec<f64> = (0..n).map(|i| 100.5 + i as f64 * 2.0).collect();
        (highs, lows, closes)
    }

    #[test]
    fn warm_up_positions() {
        let (highs, lows, closes) = trending_up(60);
        let result = calculate(&highs, &lows, &closes, 14);
        for i in 0..14 {
            assert!(result.plus_di[i].is_none(), "+DI defined too early at {}", i);
        }
        assert!(result.plus_di[14].is_some());
        for i in 0..27 {
            assert!(result.adx[i].is_none(), "ADX defined too early at {}", i);
        }
        assert!(result.adx[27].is_some());
        assert_eq!(result.adx.len(), 60);
    }

    #[test]
    fn pure_uptrend_has_dominant_plus_di() {
        let (highs, lows, closes) = trending_up(60);
        let result = calculate(&highs, &lows, &closes, 14);
        let plus = result.latest_plus_di.unwrap();
        let minus = result.latest_minus_di.unwrap();
        assert!(plus > minus);
        // Every bar is directional, so DX is pinned at 100 and ADX converges
        // toward it.
        assert!(result.latest_adx.unwrap() > 60.0);
    }

    #[test]
    fn incremental_equals_batch() {
        let highs: Vec<f64> = (0..80).map(|i| 101.0 + (i as f64 * 0.23).sin() * 6.0).collect();
        let lows: Vec<f64> = highs.iter().map(|h| h - 2.5).collect();
        let closes: Vec<f64> = highs.iter().map(|h| h - 1.0).collect();
        let full = calculate(&highs, &lows, &closes, 14);
        for i in 28..80 {
            let prefix = calculate(&highs[..=i], &lows[..=i], &closes[..=i], 14);
            let a = prefix.latest_adx.unwrap();
            let b = full.adx[i].unwrap();
            assert!((a - b).abs() < 1e-9, "ADX mismatch at {}: {} vs {}", i, a, b);
            assert!(
                (prefix.latest_plus_di.unwrap() - full.plus_di[i].unwrap()).abs() < 1e-9,
                "+DI mismatch at {}",
                i
            );
        }
    }

    #[test]
    fn analyzer_trend_reads() {
        let (highs, lows, closes) = trending_up(60);
        let analyzer = AdxAnalyzer::default();
        let analysis = analyzer.analyze(&highs, &lows, &closes);
        assert_eq!(analysis.trend_direction, TrendDirection::Up);
        assert!(analysis.is_trending);
        assert!(analysis.trend_strength >= TrendStrength::Strong);
    }

    #[test]
    fn strength_buckets() {
        let analyzer = AdxAnalyzer::default();
        assert_eq!(analyzer.trend_strength(10.0), TrendStrength::NoTrend);
        assert_eq!(analyzer.trend_strength(22.0), TrendStrength::Weak);
        assert_eq!(analyzer.trend_strength(30.0), TrendStrength::Moderate);
        assert_eq!(analyzer.trend_strength(45.0), TrendStrength::Strong);
        assert_eq!(analyzer.trend_strength(55.0), TrendStrength::VeryStrong);
    }
}
