/// Exponential moving average, seeded with the SMA of the first `period`
/// values and smoothed with `alpha = 2 / (period + 1)` afterwards.
#[derive(Debug, Clone)]
pub struct EmaResult {
    pub latest: Option<f64>,
    pub series: Vec<Option<f64>>,
}

pub fn calculate(values: &[f64], period: usize) -> EmaResult {
    let series = series(values, period);
    EmaResult {
        latest: series.last().copied().flatten(),
        series,
    }
}

/// Full series, aligned 1:1 with the input. The first `period - 1` positions
/// are warm-up.
pub fn series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut result = vec![None; n];
    if period == 0 || n < period {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut ema: f64 = values[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(ema);

    for i in period..n {
        ema = alpha * values[i] + (1.0 - alpha) * ema;
        result[i] = Some(ema);
    }

    result
}
