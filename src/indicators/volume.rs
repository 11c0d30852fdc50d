use crate::models::{VolumeCondition, VolumeTrend};

/// Volume against its own moving average.
#[derive(Debug, Clone)]
pub struct VolumeResult {
    pub ma: Vec<Option<f64>>,
    pub ratio: Vec<Option<f64>>,
    pub latest_ma: Option<f64>,
    pub latest_ratio: Option<f64>,
}

pub fn calculate(volumes: &[f64], ma_period: usize) -> VolumeResult {
    let n = volumes.len();
    let mut ma = vec![None; n];
    let mut ratio = vec![None; n];

    if ma_period > 0 && n >= ma_period {
        for i in ma_period - 1..n {
            let avg = volumes[i + 1 - ma_period..=i].iter().sum::<f64>() / ma_period as f64;
            ma[i] = Some(avg);
            if avg > 0.0 {
                ratio[i] = Some(volumes[i] / avg);
            }
        }
    }

    VolumeResult {
        latest_ma: ma.last().copied().flatten(),
        latest_ratio: ratio.last().copied().flatten(),
        ma,
        ratio,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceVolumeDivergence {
    /// Price falling on fading volume; selling pressure is exhausting.
    Bullish,
    /// Price rising on fading volume; the advance lacks participation.
    Bearish,
}

#[derive(Debug, Clone)]
pub struct VolumeAnalysis {
    pub condition: VolumeCondition,
    pub trend: VolumeTrend,
    pub ratio: Option<f64>,
    pub ma: Option<f64>,
    pub is_spike: bool,
}

#[derive(Debug, Clone)]
pub struct VolumeAnalyzer {
    pub ma_period: usize,
    pub spike_threshold: f64,
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub very_low_threshold: f64,
    pub trend_lookback: usize,
}

impl Default for VolumeAnalyzer {
    fn default() -> Self {
        Self {
            ma_period: 20,
            spike_threshold: 2.0,
            high_threshold: 1.5,
            low_threshold: 0.7,
            very_low_threshold: 0.5,
            trend_lookback: 3,
        }
    }
}

impl VolumeAnalyzer {
    pub fn analyze(&self, volumes: &[f64]) -> VolumeAnalysis {
        let result = calculate(volumes, self.ma_period);
        let ratio = result.latest_ratio;

        let condition = match ratio {
            None => VolumeCondition::Normal,
            Some(r) if r >= self.spike_threshold => VolumeCondition::Spike,
            Some(r) if r >= self.high_threshold => VolumeCondition::High,
            Some(r) if r <= self.very_low_threshold => VolumeCondition::VeryLow,
            Some(r) if r <= self.low_threshold => VolumeCondition::Low,
            Some(_) => VolumeCondition::Normal,
        };

        let trend = self.trend(&result.ratio);
        let is_spike = ratio.is_some_and(|r| r >= self.spike_threshold);

        VolumeAnalysis {
            condition,
            trend,
            ratio,
            ma: result.latest_ma,
            is_spike,
        }
    }

    /// Price pushing one way while volume dries up: the move lacks backing.
    pub fn divergence(&self, closes: &[f64], volumes: &[f64]) -> Option<PriceVolumeDivergence> {
        if closes.len() < 5 || volumes.len() < 5 {
            return None;
        }
        let c = &closes[closes.len() - 5..];
        let v = &volumes[volumes.len() - 5..];
        if c[0] == 0.0 {
            return None;
        }
        let early_avg = (v[0] + v[1]) / 2.0;
        if early_avg <= 0.0 {
            return None;
        }
        let price_change = (c[4] - c[0]) / c[0];
        let volume_change = (v[3] + v[4]) / 2.0 / early_avg - 1.0;

        if price_change > 0.01 && volume_change < -0.2 {
            Some(PriceVolumeDivergence::Bearish)
        } else if price_change < -0.01 && volume_change < -0.2 {
            Some(PriceVolumeDivergence::Bullish)
        } else {
            None
        }
    }

    fn trend(&self, ratio_series: &[Option<f64>]) -> VolumeTrend {
        let tail_start = ratio_series.len().saturating_sub(self.trend_lookback);
        let valid: Vec<f64> = ratio_series[tail_start..].iter().copied().flatten().collect();
        if valid.len() < 2 {
            return VolumeTrend::Stable;
        }
        let increasing = valid.windows(2).all(|w| w[0] < w[1]);
        let decreasing = valid.windows(2).all(|w| w[0] > w[1]);
        if increasing {
            VolumeTrend::Increasing
        } else if decreasing {
            VolumeTrend::Decreasing
        } else {
            VolumeTrend::Stable
        }
    }
}
