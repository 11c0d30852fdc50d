use crate::config::RangingParams;
use crate::indicators::{atr, bollinger, kdj, rsi, volume, IndicatorSnapshot};
use crate::models::SignalDirection;
use crate::strategy::signal::StrategySignal;

/// Mean-reversion at the band rails, for markets the classifier tags as
/// ranging. Counts per-direction contributors and emits when at least two
/// line up.
pub struct RangingStrategy {
    pub params: RangingParams,
    rsi_period: usize,
    kdj_period: usize,
    kdj_smooth: usize,
    bb_period: usize,
    bb_std_dev: f64,
    atr_period: usize,
    volume_analyzer: volume::VolumeAnalyzer,
}

struct SideScore {
    signals: usize,
    strength: f64,
    reasons: Vec<String>,
}

impl RangingStrategy {
    pub fn new(params: RangingParams, cfg: &crate::config::IndicatorParams) -> Self {
        Self {
            params,
            rsi_period: cfg.rsi_period,
            kdj_period: cfg.kdj_period,
            kdj_smooth: cfg.kdj_smooth,
            bb_period: cfg.bb_period,
            bb_std_dev: cfg.bb_std_dev,
            atr_period: cfg.atr_period,
            volume_analyzer: volume::VolumeAnalyzer {
                ma_period: cfg.volume_ma_period,
                ..Default::default()
            },
        }
    }

    pub fn name(&self) -> &'static str {
        "ranging"
    }

    pub fn analyze(
        &self,
        highs: &[f64],
        lows: &[f64],
        closes: &[f64],
        volumes: &[f64],
    ) -> StrategySignal {
        if closes.len() < 30 {
            return StrategySignal::hold(self.name(), "not enough history", IndicatorSnapshot::default());
        }
        let current_price = closes[closes.len() - 1];

        let rsi_result = rsi::calculate(closes, self.rsi_period);
        let kdj_result = kdj::calculate(highs, lows, closes, self.kdj_period, self.kdj_smooth);
        let bb_result = bollinger::calculate(closes, self.bb_period, self.bb_std_dev);
        let atr_result = atr::calculate(highs, lows, closes, self.atr_period);
        let vol_analysis = self.volume_analyzer.analyze(volumes);
        let volume_low = vol_analysis.condition.is_low();

        let buy = self.score_buy(&rsi_result, &kdj_result, &bb_result, volume_low);
        let sell = self.score_sell(&rsi_result, &kdj_result, &bb_result, volume_low);

        let indicator_values = IndicatorSnapshot {
            rsi: rsi_result.latest,
            kdj_k: kdj_result.latest.map(|v| v.k),
            kdj_d: kdj_result.latest.map(|v| v.d),
            kdj_j: kdj_result.latest.map(|v| v.j),
            bb_upper: bb_result.latest.map(|v| v.upper),
            bb_middle: bb_result.latest.map(|v| v.middle),
            bb_lower: bb_result.latest.map(|v| v.lower),
            bb_percent_b: bb_result.latest.map(|v| v.percent_b),
            atr: atr_result.latest,
            volume_ratio: vol_analysis.ratio,
            ..Default::default()
        };

        if buy.signals >= 2 && buy.strength >= self.params.min_strength && buy.strength > sell.strength {
            let stop_loss = atr_result.latest.map(|atr| current_price - atr * 2.0);
            let take_profit = bb_result.latest.map(|v| v.middle);
            return StrategySignal {
                direction: SignalDirection::Buy,
                strength: buy.strength.min(1.0),
                strategy_name: self.name().to_string(),
                reasons: buy.reasons,
                entry_price: Some(current_price),
                stop_loss,
                take_profit,
                indicator_values,
                signal_count: buy.signals,
            };
        }

        if sell.signals >= 2 && sell.strength >= self.params.min_strength && sell.strength > buy.strength {
            let stop_loss = atr_result.latest.map(|atr| current_price + atr * 2.0);
            let take_profit = bb_result.latest.map(|v| v.middle);
            return StrategySignal {
                direction: SignalDirection::Sell,
                strength: sell.strength.min(1.0),
                strategy_name: self.name().to_string(),
                reasons: sell.reasons,
                entry_price: Some(current_price),
                stop_loss,
                take_profit,
                indicator_values,
                signal_count: sell.signals,
            };
        }

        StrategySignal::hold(self.name(), "range conditions not met", indicator_values)
    }

    fn score_buy(
        &self,
        rsi_result: &rsi::RsiResult,
        kdj_result: &kdj::KdjResult,
        bb_result: &bollinger::BollingerResult,
        volume_low: bool,
    ) -> SideScore {
        let mut score = SideScore {
            signals: 0,
            strength: 0.0,
            reasons: Vec::new(),
        };

        if let Some(percent_b) = bb_result.latest.map(|v| v.percent_b) {
            if percent_b < 0.0 {
                score.signals += 1;
                score.strength += 0.35;
                score.reasons.push(format!("close below lower band (%B={:.2})", percent_b));
            } else if percent_b < self.params.bb_lower_threshold {
                score.signals += 1;
                score.strength += 0.25;
                score.reasons.push(format!("close near lower band (%B={:.2})", percent_b));
            }
        }

        if let Some(rsi) = rsi_result.latest {
            if rsi < 20.0 {
                score.signals += 1;
                score.strength += 0.30;
                score.reasons.push(format!("RSI deeply oversold ({:.1})", rsi));
            } else if rsi < self.params.rsi_oversold {
                score.signals += 1;
                score.strength += 0.20;
                score.reasons.push(format!("RSI oversold ({:.1})", rsi));
            }
        }

        if let Some(value) = kdj_result.latest {
            if value.j < self.params.j_extreme_low {
                score.signals += 1;
                score.strength += 0.25;
                score.reasons.push(format!("KDJ J extremely low ({:.1})", value.j));
            } else if value.k < self.params.kdj_oversold {
                score.signals += 1;
                score.strength += 0.15;
                score.reasons.push(format!("KDJ K oversold ({:.1})", value.k));
            }

            if let Some((prev_k, prev_d)) = previous_pair(kdj_result) {
                if prev_k < prev_d && value.k > value.d {
                    score.signals += 1;
                    score.strength += 0.20;
                    score.reasons.push("KDJ golden cross".to_string());
                }
            }
        }

        if volume_low {
            score.strength += 0.10;
            score.reasons.push("volume drying up (selling exhausted)".to_string());
        }

        score.strength = score.strength.min(1.0);
        score
    }

    fn score_sell(
        &self,
        rsi_result: &rsi::RsiResult,
        kdj_result: &kdj::KdjResult,
        bb_result: &bollinger::BollingerResult,
        volume_low: bool,
    ) -> SideScore {
        let mut score = SideScore {
            signals: 0,
            strength: 0.0,
            reasons: Vec::new(),
        };

        if let Some(percent_b) = bb_result.latest.map(|v| v.percent_b) {
            if percent_b > 1.0 {
                score.signals += 1;
                score.strength += 0.35;
                score.reasons.push(format!("close above upper band (%B={:.2})", percent_b));
            } else if percent_b > self.params.bb_upper_threshold {
                score.signals += 1;
                score.strength += 0.25;
                score.reasons.push(format!("close near upper band (%B={:.2})", percent_b));
            }
        }

        if let Some(rsi) = rsi_result.latest {
            if rsi > 80.0 {
                score.signals += 1;
                score.strength += 0.30;
                score.reasons.push(format!("RSI deeply overbought ({:.1})", rsi));
            } else if rsi > self.params.rsi_overbought {
                score.signals += 1;
                score.strength += 0.20;
                score.reasons.push(format!("RSI overbought ({:.1})", rsi));
            }
        }

        if let Some(value) = kdj_result.latest {
            if value.j > self.params.j_extreme_high {
                score.signals += 1;
                score.strength += 0.25;
                score.reasons.push(format!("KDJ J extremely high ({:.1})", value.j));
            } else if value.k > self.params.kdj_overbought {
                score.signals += 1;
                score.strength += 0.15;
                score.reasons.push(format!("KDJ K overbought ({:.1})", value.k));
            }

            if let Some((prev_k, prev_d)) = previous_pair(kdj_result) {
                if prev_k > prev_d && value.k < value.d {
                    score.signals += 1;
                    score.strength += 0.20;
                    score.reasons.push("KDJ dead cross".to_string());
                }
            }
        }

        if volume_low {
            score.strength += 0.10;
            score.reasons.push("volume drying up (buying exhausted)".to_string());
        }

        score.strength = score.strength.min(1.0);
        score
    }
}

fn previous_pair(result: &kdj::KdjResult) -> Option<(f64, f64)> {
    let n = result.k.len();
    if n < 2 {
        return None;
    }
    result.k[n - 2].zip(result.d[n - 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{default_test_config, oversold_range_series};

    fn strategy() -> RangingStrategy {
        let cfg = default_test_config();
        RangingStrategy::new(cfg.ranging.clone(), &cfg.indicators)
    }

    #[test]
    fn oversold_lower_band_is_buy() {
        let (highs, lows, closes, volumes) = oversold_range_series();
        let signal = strategy().analyze(&highs, &lows, &closes, &volumes);
        assert_eq!(signal.direction, SignalDirection::Buy);
        assert!(signal.signal_count >= 2, "signals: {:?}", signal.reasons);
        assert!(signal.strength >= 0.5, "strength {}", signal.strength);
        assert!(signal.stop_loss.unwrap() < signal.entry_price.unwrap());
        // Target is the midline: above entry for a rail-bounce long.
        assert!(signal.take_profit.unwrap() > signal.entry_price.unwrap());
    }

    #[test]
    fn quiet_middle_of_range_is_hold() {
        // Flat tape sitting on the midline: no rail touch, no extreme.
        let n = 60;
        let highs: Vec<f64> = (0..n).map(|i| 100.6 + ((i % 2) as f64) * 0.2).collect();
        let lows: Vec<f64> = (0..n).map(|i| 99.4 - ((i % 2) as f64) * 0.2).collect();
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + ((i % 2) as f64) * 0.1).collect();
        let volumes = vec![10.0; n];
        let signal = strategy().analyze(&highs, &lows, &closes, &volumes);
        assert_eq!(signal.direction, SignalDirection::Hold);
    }

    #[test]
    fn short_history_is_hold() {
        let signal = strategy().analyze(&[101.0; 10], &[99.0; 10], &[100.0; 10], &[10.0; 10]);
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert_eq!(signal.reasons, vec!["not enough history".to_string()]);
    }
}
