use crate::config::BreakoutParams;
use crate::indicators::{adx, atr, macd, volume, IndicatorSnapshot};
use crate::models::SignalDirection;
use crate::strategy::signal::StrategySignal;

/// Chase confirmed range breaks: a fresh traversal of the lookback extreme
/// by a volatility-scaled margin, ideally on expanding volume and range.
pub struct BreakoutStrategy {
    pub params: BreakoutParams,
    macd_fast: usize,
    macd_slow: usize,
    macd_signal: usize,
    atr_period: usize,
    adx_period: usize,
    volume_analyzer: volume::VolumeAnalyzer,
}

impl BreakoutStrategy {
    pub fn new(params: BreakoutParams, cfg: &crate::config::IndicatorParams) -> Self {
        Self {
            params,
            macd_fast: cfg.macd_fast,
            macd_slow: cfg.macd_slow,
            macd_signal: cfg.macd_signal,
            atr_period: cfg.atr_period,
            adx_period: cfg.adx_period,
            volume_analyzer: volume::VolumeAnalyzer {
                ma_period: cfg.volume_ma_period,
                ..Default::default()
            },
        }
    }

    pub fn name(&self) -> &'static str {
        "breakout"
    }

    pub fn analyze(
        &self,
        highs: &[f64],
        lows: &[f64],
        closes: &[f64],
        volumes: &[f64],
    ) -> StrategySignal {
        let n = closes.len();
        if n < self.params.lookback_period + 10 {
            return StrategySignal::hold(self.name(), "not enough history", IndicatorSnapshot::default());
        }
        let current_price = closes[n - 1];

        let macd_result = macd::calculate(closes, self.macd_fast, self.macd_slow, self.macd_signal);
        let atr_result = atr::calculate(highs, lows, closes, self.atr_period);
        let adx_result = adx::calculate(highs, lows, closes, self.adx_period);
        let vol_analysis = self.volume_analyzer.analyze(volumes);

        let lookback = self.params.lookback_period;
        let resistance = highs[n - 1 - lookback..n - 1]
            .iter()
            .fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let support = lows[n - 1 - lookback..n - 1]
            .iter()
            .fold(f64::INFINITY, |a, &b| a.min(b));

        let atr_analyzer = atr::AtrAnalyzer {
            period: self.atr_period,
            ..Default::default()
        };
        let atr_expanding =
            atr_analyzer.is_expanding(&atr_result, self.params.atr_expansion_threshold);

        let indicator_values = IndicatorSnapshot {
            macd: macd_result.latest.map(|v| v.macd),
            macd_histogram: macd_result.latest.map(|v| v.histogram),
            atr: atr_result.latest,
            adx: adx_result.latest_adx,
            plus_di: adx_result.latest_plus_di,
            minus_di: adx_result.latest_minus_di,
            volume_ratio: vol_analysis.ratio,
            ..Default::default()
        };

        if self.breaks_up(current_price, resistance, atr_result.latest) {
            let (signals, reasons, strength) = self.score(
                SignalDirection::Buy,
                &macd_result,
                atr_expanding,
                adx_result.latest_plus_di,
                adx_result.latest_minus_di,
                vol_analysis.ratio,
                vol_analysis.is_spike,
                resistance,
            );
            if signals >= 2 && strength >= 0.5 {
                let take_profit = atr_result.latest.map(|atr| current_price + atr * 3.0);
                return StrategySignal {
                    direction: SignalDirection::Buy,
                    strength: strength.min(1.0),
                    strategy_name: self.name().to_string(),
                    reasons,
                    entry_price: Some(current_price),
                    stop_loss: Some(support),
                    take_profit,
                    indicator_values,
                    signal_count: signals,
                };
            }
        }

        if self.breaks_down(current_price, support, atr_result.latest) {
            let (signals, reasons, strength) = self.score(
                SignalDirection::Sell,
                &macd_result,
                atr_expanding,
                adx_result.latest_plus_di,
                adx_result.latest_minus_di,
                vol_analysis.ratio,
                vol_analysis.is_spike,
                support,
            );
            if signals >= 2 && strength >= 0.5 {
                let take_profit = atr_result.latest.map(|atr| current_price - atr * 3.0);
                return StrategySignal {
                    direction: SignalDirection::Sell,
                    strength: strength.min(1.0),
                    strategy_name: self.name().to_string(),
                    reasons,
                    entry_price: Some(current_price),
                    stop_loss: Some(resistance),
                    take_profit,
                    indicator_values,
                    signal_count: signals,
                };
            }
        }

        StrategySignal::hold(self.name(), "no valid breakout", indicator_values)
    }

    fn breaks_up(&self, close: f64, resistance: f64, atr: Option<f64>) -> bool {
        match atr {
            Some(atr) => close > resistance && (close - resistance) > atr * self.params.min_breakout_atr,
            None => close > resistance,
        }
    }

    fn breaks_down(&self, close: f64, support: f64, atr: Option<f64>) -> bool {
        match atr {
            Some(atr) => close < support && (support - close) > atr * self.params.min_breakout_atr,
            None => close < support,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn score(
        &self,
        direction: SignalDirection,
        macd_result: &macd::MacdResult,
        atr_expanding: bool,
        plus_di: Option<f64>,
        minus_di: Option<f64>,
        volume_ratio: Option<f64>,
        volume_spike: bool,
        level: f64,
    ) -> (usize, Vec<String>, f64) {
        let buying = direction == SignalDirection::Buy;
        let mut signals = 1;
        let mut strength: f64 = 0.25;
        let mut reasons = vec![if buying {
            format!("close broke resistance {:.2}", level)
        } else {
            format!("close broke support {:.2}", level)
        }];

        if self.params.volume_confirmation {
            if volume_spike {
                signals += 1;
                strength += 0.25;
                reasons.push(format!(
                    "volume spike confirms (ratio {:.2})",
                    volume_ratio.unwrap_or(0.0)
                ));
            } else if volume_ratio.is_some_and(|r| r >= self.params.min_volume_ratio) {
                signals += 1;
                strength += 0.20;
                reasons.push(format!(
                    "volume expansion confirms (ratio {:.2})",
                    volume_ratio.unwrap_or(0.0)
                ));
            } else {
                strength -= 0.15;
                reasons.push("warning: breakout without volume spike".to_string());
            }
        }

        if atr_expanding {
            signals += 1;
            strength += 0.15;
            reasons.push("ATR expanding".to_string());
        }

        if let Some(value) = macd_result.latest {
            let aligned = if buying {
                value.histogram > 0.0
            } else {
                value.histogram < 0.0
            };
            if aligned {
                signals += 1;
                strength += 0.15;
                reasons.push(format!("MACD histogram aligned ({:.4})", value.histogram));
                if let Some(prev) = previous_histogram(macd_result) {
                    let momentum_up = if buying {
                        value.histogram > prev
                    } else {
                        value.histogram < prev
                    };
                    if momentum_up {
                        strength += 0.05;
                        reasons.push("MACD momentum increasing".to_string());
                    }
                }
            }
        }

        if let (Some(plus), Some(minus)) = (plus_di, minus_di) {
            let aligned = if buying { plus > minus } else { minus > plus };
            if aligned {
                signals += 1;
                strength += 0.10;
                reasons.push(if buying {
                    format!("+DI > -DI ({:.1} > {:.1})", plus, minus)
                } else {
                    format!("-DI > +DI ({:.1} > {:.1})", minus, plus)
                });
            }
        }

        (signals, reasons, strength.clamp(0.0, 1.0))
    }
}

fn previous_histogram(result: &macd::MacdResult) -> Option<f64> {
    let n = result.histogram.len();
    if n < 2 {
        return None;
    }
    result.histogram[n - 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{breakout_series, default_test_config};

    fn strategy() -> BreakoutStrategy {
        let cfg = default_test_config();
        BreakoutStrategy::new(cfg.breakout.clone(), &cfg.indicators)
    }

    #[test]
    fn volume_confirmed_breakout_is_buy() {
        let (highs, lows, closes, volumes) = breakout_series(true);
        let signal = strategy().analyze(&highs, &lows, &closes, &volumes);
        assert_eq!(signal.direction, SignalDirection::Buy, "reasons: {:?}", signal.reasons);
        assert!(signal.signal_count >= 2);
        assert!(signal.strength >= 0.5);
        assert!(!signal
            .reasons
            .iter()
            .any(|r| r.contains("without volume spike")));
        // Stop sits at the opposite prior extreme.
        assert!(signal.stop_loss.unwrap() < signal.entry_price.unwrap());
    }

    #[test]
    fn breakout_without_volume_is_penalized() {
        let (highs, lows, closes, volumes) = breakout_series(false);
        let with_volume = {
            let (h, l, c, v) = breakout_series(true);
            strategy().analyze(&h, &l, &c, &v)
        };
        let without_volume = strategy().analyze(&highs, &lows, &closes, &volumes);

        // Same tape, flat volume: the warning shows up and the score drops by
        // the 0.15 penalty plus the missing volume contributor.
        if without_volume.direction == SignalDirection::Buy {
            assert!(without_volume
                .reasons
                .iter()
                .any(|r| r.contains("without volume spike")));
            assert!(without_volume.strength < with_volume.strength);
        } else {
            // Under the penalty the signal may fail the 0.5 floor entirely.
            assert_eq!(without_volume.direction, SignalDirection::Hold);
        }
    }

    #[test]
    fn quiet_range_is_hold() {
        let n = 60;
        let closes: Vec<f64> = (0..n)
            .map(|i| 100.0 + if i % 2 == 0 { 0.4 } else { -0.4 })
            .collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 0.5).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 0.5).collect();
        let volumes = vec![10.0; n];
        let signal = strategy().analyze(&highs, &lows, &closes, &volumes);
        assert_eq!(signal.direction, SignalDirection::Hold);
    }
}
