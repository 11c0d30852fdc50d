/// Commodity Channel Index over typical price `(h + l + c) / 3`. The mean
/// absolute deviation is taken over the same window that ends at the current
/// bar, matching the TradingView reference.
#[derive(Debug, Clone)]
pub struct CciResult {
    pub latest: Option<f64>,
    pub series: Vec<Option<f64>>,
}

pub fn calculate(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> CciResult {
    let n = closes.len();
    let mut series = vec![None; n];
    if period == 0 || n < period || highs.len() != n || lows.len() != n {
        return CciResult {
            latest: None,
            series,
        };
    }

    let typical: Vec<f64> = (0..n)
        .map(|i| (highs[i] + lows[i] + closes[i]) / 3.0)
        .collect();

    for i in period - 1..n {
        let window = &typical[i + 1 - period..=i];
        let ma = window.iter().sum::<f64>() / period as f64;
        let md = window.iter().map(|v| (v - ma).abs()).sum::<f64>() / period as f64;
        series[i] = Some(if md == 0.0 {
            0.0
        } else {
            (typical[i] - ma) / (0.015 * md)
        });
    }

    CciResult {
        latest: series.last().copied().flatten(),
        series,
    }
}
