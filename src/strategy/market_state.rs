use serde::{Deserialize, Serialize};

use crate::config::MarketStateThresholds;
use crate::indicators::{adx, atr, volume};
use crate::models::{MarketState, TrendDirection, TrendStrength, VolumeCondition};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStateResult {
    pub state: MarketState,
    pub confidence: f64,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub trend_strength: TrendStrength,
    pub trend_direction: TrendDirection,
    pub is_breakout: bool,
    pub breakout_direction: Option<TrendDirection>,
    pub volume_spike: bool,
    pub atr_expanding: bool,
    pub atr: Option<f64>,
    pub adx_rising: Option<bool>,
}

impl MarketStateResult {
    pub fn is_suitable_for_trading(&self) -> bool {
        self.state != MarketState::Unknown && self.confidence >= 0.5
    }
}

/// ADX-driven regime classifier with ATR and volume as breakout witnesses.
pub struct MarketStateDetector {
    pub thresholds: MarketStateThresholds,
    pub adx_analyzer: adx::AdxAnalyzer,
    pub atr_period: usize,
    pub volume_analyzer: volume::VolumeAnalyzer,
    pub breakout_lookback: usize,
}

impl MarketStateDetector {
    pub fn new(thresholds: MarketStateThresholds, adx_period: usize, atr_period: usize, volume_ma_period: usize) -> Self {
        Self {
            thresholds,
            adx_analyzer: adx::AdxAnalyzer {
                period: adx_period,
                ..Default::default()
            },
            atr_period,
            volume_analyzer: volume::VolumeAnalyzer {
                ma_period: volume_ma_period,
                ..Default::default()
            },
            breakout_lookback: 20,
        }
    }

    pub fn detect(
        &self,
        highs: &[f64],
        lows: &[f64],
        closes: &[f64],
        volumes: &[f64],
    ) -> MarketStateResult {
        let adx_analysis = self.adx_analyzer.analyze(highs, lows, closes);

        let atr_result = atr::calculate(highs, lows, closes, self.atr_period);
        let atr_expanding = self.check_atr_expanding(&atr_result.series);

        let volume_analysis = self.volume_analyzer.analyze(volumes);
        let volume_spike = volume_analysis
            .ratio
            .is_some_and(|r| r >= self.thresholds.volume_spike_for_breakout);

        let (is_breakout, breakout_direction) =
            self.check_price_breakout(highs, lows, closes, atr_result.latest);

        let (state, confidence) = self.classify(
            &adx_analysis,
            atr_expanding,
            volume_spike,
            volume_analysis.condition,
            is_breakout,
            breakout_direction,
        );

        MarketStateResult {
            state,
            confidence,
            adx: adx_analysis.adx,
            plus_di: adx_analysis.plus_di,
            minus_di: adx_analysis.minus_di,
            trend_strength: adx_analysis.trend_strength,
            trend_direction: adx_analysis.trend_direction,
            is_breakout,
            breakout_direction,
            volume_spike,
            atr_expanding,
            atr: atr_result.latest,
            adx_rising: adx_analysis.adx_rising,
        }
    }

    fn check_atr_expanding(&self, atr_series: &[Option<f64>]) -> bool {
        let valid: Vec<f64> = atr_series.iter().copied().flatten().collect();
        if valid.len() < 3 {
            return false;
        }
        let recent = valid[valid.len() - 1];
        let prev_avg = if valid.len() >= 4 {
            valid[valid.len() - 4..valid.len() - 1].iter().sum::<f64>() / 3.0
        } else {
            valid[valid.len() - 2]
        };
        recent > prev_avg * self.thresholds.atr_spike_for_breakout
    }

    /// Close traversing the recent extreme by at least half an ATR.
    fn check_price_breakout(
        &self,
        highs: &[f64],
        lows: &[f64],
        closes: &[f64],
        atr: Option<f64>,
    ) -> (bool, Option<TrendDirection>) {
        let n = closes.len();
        let Some(atr) = atr else {
            return (false, None);
        };
        if n < self.breakout_lookback + 1 {
            return (false, None);
        }

        let lookback = &highs[n - 1 - self.breakout_lookback..n - 1];
        let recent_high = lookback.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let lookback_lows = &lows[n - 1 - self.breakout_lookback..n - 1];
        let recent_low = lookback_lows.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let close = closes[n - 1];

        if close > recent_high && (close - recent_high) > atr * 0.5 {
            return (true, Some(TrendDirection::Up));
        }
        if close < recent_low && (recent_low - close) > atr * 0.5 {
            return (true, Some(TrendDirection::Down));
        }
        (false, None)
    }

    fn classify(
        &self,
        adx_analysis: &adx::AdxAnalysis,
        atr_expanding: bool,
        volume_spike: bool,
        volume_condition: VolumeCondition,
        is_breakout: bool,
        breakout_direction: Option<TrendDirection>,
    ) -> (MarketState, f64) {
        let Some(adx) = adx_analysis.adx else {
            return (MarketState::Unknown, 0.0);
        };

        // Strong trend or confirmed breakout regime.
        if adx > self.thresholds.adx_strong_trend || (is_breakout && (atr_expanding || volume_spike)) {
            if is_breakout {
                let mut confidence: f64 = 0.85;
                if atr_expanding {
                    confidence += 0.05;
                }
                if volume_spike {
                    confidence += 0.05;
                }
                let state = match breakout_direction {
                    Some(TrendDirection::Down) => MarketState::BreakoutDown,
                    _ => MarketState::BreakoutUp,
                };
                return (state, confidence.min(1.0));
            }
            if adx > self.thresholds.adx_strong_trend {
                match adx_analysis.trend_direction {
                    TrendDirection::Up => return (MarketState::TrendingUp, 0.75),
                    TrendDirection::Down => return (MarketState::TrendingDown, 0.75),
                    TrendDirection::None => {}
                }
            }
        }

        // Ordinary trending regime.
        if adx >= self.thresholds.adx_ranging {
            let mut confidence: f64 = 0.6;
            if adx_analysis.adx_rising == Some(true) {
                confidence += 0.1;
            }
            if adx_analysis.di_crossover.is_some() {
                confidence += 0.1;
            }
            let plus = adx_analysis.plus_di.unwrap_or(0.0);
            let minus = adx_analysis.minus_di.unwrap_or(0.0);
            if adx_analysis.trend_direction == TrendDirection::Up || plus > minus {
                return (MarketState::TrendingUp, confidence.min(1.0));
            }
            if adx_analysis.trend_direction == TrendDirection::Down || minus > plus {
                return (MarketState::TrendingDown, confidence.min(1.0));
            }
        }

        if adx < self.thresholds.adx_ranging {
            let mut confidence: f64 = 0.7;
            if adx_analysis.adx_rising == Some(false) {
                confidence += 0.1;
            }
            if volume_condition.is_low() {
                confidence += 0.05;
            }
            return (MarketState::Ranging, confidence.min(1.0));
        }

        (MarketState::Unknown, 0.3)
    }
}
