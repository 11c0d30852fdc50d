use crate::models::SignalDirection;

/// Bollinger bands over an SMA midline with population standard deviation
/// (divisor `n`, not `n - 1`).
#[derive(Debug, Clone)]
pub struct BollingerResult {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub percent_b: Vec<Option<f64>>,
    pub bandwidth: Vec<Option<f64>>,
    pub latest: Option<BollingerValue>,
}

#[derive(Debug, Clone, Copy)]
pub struct BollingerValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub percent_b: f64,
    pub bandwidth: f64,
}

pub fn calculate(closes: &[f64], period: usize, std_dev: f64) -> BollingerResult {
    let n = closes.len();
    let mut upper = vec![None; n];
    let mut middle = vec![None; n];
    let mut lower = vec![None; n];
    let mut percent_b = vec![None; n];
    let mut bandwidth = vec![None; n];

    if period > 0 && n >= period {
        for i in period - 1..n {
            let window = &closes[i + 1 - period..=i];
            let mid = window.iter().sum::<f64>() / period as f64;
            let variance =
                window.iter().map(|v| (v - mid) * (v - mid)).sum::<f64>() / period as f64;
            let std = variance.sqrt();
            let up = mid + std_dev * std;
            let low = mid - std_dev * std;

            let pb = if up != low {
                (closes[i] - low) / (up - low)
            } else {
                0.5
            };
            let bw = if mid != 0.0 { (up - low) / mid } else { 0.0 };

            upper[i] = Some(up);
            middle[i] = Some(mid);
            lower[i] = Some(low);
            percent_b[i] = Some(pb);
            bandwidth[i] = Some(bw);
        }
    }

    let latest = match (
        upper.last().copied().flatten(),
        middle.last().copied().flatten(),
        lower.last().copied().flatten(),
        percent_b.last().copied().flatten(),
        bandwidth.last().copied().flatten(),
    ) {
        (Some(u), Some(m), Some(l), Some(pb), Some(bw)) => Some(BollingerValue {
            upper: u,
            middle: m,
            lower: l,
            percent_b: pb,
            bandwidth: bw,
        }),
        _ => None,
    };

    BollingerResult {
        upper,
        middle,
        lower,
        percent_b,
        bandwidth,
        latest,
    }
}

#[derive(Debug, Clone)]
pub struct BollingerAnalyzer {
    pub period: usize,
    pub std_dev: f64,
    pub squeeze_threshold: f64,
}

impl Default for BollingerAnalyzer {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev: 2.0,
            squeeze_threshold: 0.05,
        }
    }
}

impl BollingerAnalyzer {
    /// Touch signals with a 1% tolerance band around the rails.
    pub fn signal(&self, result: &BollingerResult, close: f64) -> SignalDirection {
        let Some(latest) = result.latest else {
            return SignalDirection::Hold;
        };
        if close <= latest.lower * 1.01 {
            SignalDirection::Buy
        } else if close >= latest.upper * 0.99 {
            SignalDirection::Sell
        } else {
            SignalDirection::Hold
        }
    }

    pub fn is_squeeze(&self, result: &BollingerResult) -> bool {
        result
            .latest
            .map(|v| v.bandwidth < self.squeeze_threshold)
            .unwrap_or(false)
    }

    /// Just exited a squeeze with %B pinned to one rail.
    pub fn squeeze_breakout(&self, result: &BollingerResult) -> Option<SignalDirection> {
        let n = result.bandwidth.len();
        if n < 2 {
            return None;
        }
        let prev_bw = result.bandwidth[n - 2]?;
        let latest = result.latest?;
        if prev_bw >= self.squeeze_threshold || latest.bandwidth < self.squeeze_threshold {
            return None;
        }
        if latest.percent_b > 0.8 {
            Some(SignalDirection::Buy)
        } else if latest.percent_b < 0.2 {
            Some(SignalDirection::Sell)
        } else {
            None
        }
    }
}
