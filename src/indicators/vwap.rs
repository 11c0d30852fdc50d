/// Session-less VWAP: a running `sum(tp * v) / sum(v)` over the supplied
/// slice. The caller decides where the session starts by slicing.
#[derive(Debug, Clone)]
pub struct VwapResult {
    pub latest: Option<f64>,
    pub series: Vec<Option<f64>>,
}

pub fn calculate(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64]) -> VwapResult {
    let n = closes.len();
    let mut series = vec![None; n];
    if n == 0 || highs.len() != n || lows.len() != n || volumes.len() != n {
        return VwapResult {
            latest: None,
            series,
        };
    }

    let mut cumulative_pv = 0.0;
    let mut cumulative_volume = 0.0;
    for i in 0..n {
        let typical = (highs[i] + lows[i] + closes[i]) / 3.0;
        cumulative_pv += typical * volumes[i];
        cumulative_volume += volumes[i];
        if cumulative_volume > 0.0 {
            series[i] = Some(cumulative_pv / cumulative_volume);
        }
    }

    VwapResult {
        latest: series.last().copied().flatten(),
        series,
    }
}
