use crate::config::TrendingParams;
use crate::indicators::{atr, ema, macd, rsi, volume, IndicatorSnapshot};
use crate::models::{SignalDirection, TrendDirection, VolumeCondition};
use crate::strategy::signal::StrategySignal;

/// Pullback-with-the-trend entries for the ADX 20-40 band. Needs the EMA
/// stack aligned, price near the middle EMA, and momentum not exhausted.
pub struct TrendingStrategy {
    pub params: TrendingParams,
    rsi_period: usize,
    macd_fast: usize,
    macd_slow: usize,
    macd_signal: usize,
    ema_fast: usize,
    ema_medium: usize,
    ema_slow: usize,
    atr_period: usize,
    volume_analyzer: volume::VolumeAnalyzer,
}

impl TrendingStrategy {
    pub fn new(params: TrendingParams, cfg: &crate::config::IndicatorParams) -> Self {
        Self {
            params,
            rsi_period: cfg.rsi_period,
            macd_fast: cfg.macd_fast,
            macd_slow: cfg.macd_slow,
            macd_signal: cfg.macd_signal,
            ema_fast: cfg.ema_fast,
            ema_medium: cfg.ema_medium,
            ema_slow: cfg.ema_slow,
            atr_period: cfg.atr_period,
            volume_analyzer: volume::VolumeAnalyzer {
                ma_period: cfg.volume_ma_period,
                ..Default::default()
            },
        }
    }

    pub fn name(&self) -> &'static str {
        "trending"
    }

    pub fn analyze(
        &self,
        highs: &[f64],
        lows: &[f64],
        closes: &[f64],
        volumes: &[f64],
    ) -> StrategySignal {
        if closes.len() < self.ema_slow {
            return StrategySignal::hold(
                self.name(),
                "not enough history for the slow EMA",
                IndicatorSnapshot::default(),
            );
        }
        let current_price = closes[closes.len() - 1];

        let rsi_result = rsi::calculate(closes, self.rsi_period);
        let macd_result = macd::calculate(closes, self.macd_fast, self.macd_slow, self.macd_signal);
        let ema5 = ema::calculate(closes, self.ema_fast).latest;
        let ema20 = ema::calculate(closes, self.ema_medium).latest;
        let ema60 = ema::calculate(closes, self.ema_slow).latest;
        let atr_result = atr::calculate(highs, lows, closes, self.atr_period);
        let vol_analysis = self.volume_analyzer.analyze(volumes);

        let indicator_values = IndicatorSnapshot {
            rsi: rsi_result.latest,
            macd: macd_result.latest.map(|v| v.macd),
            macd_signal: macd_result.latest.map(|v| v.signal),
            macd_histogram: macd_result.latest.map(|v| v.histogram),
            ema5,
            ema20,
            ema60,
            atr: atr_result.latest,
            volume_ratio: vol_analysis.ratio,
            ..Default::default()
        };

        let trend = self.determine_trend(ema5, ema20, ema60, current_price);
        if trend == TrendDirection::None {
            return StrategySignal::hold(self.name(), "no clear trend direction", indicator_values);
        }

        let (signals, reasons, strength) = match trend {
            TrendDirection::Up => self.score_buy(
                current_price,
                rsi_result.latest,
                &macd_result,
                ema5.unwrap_or(0.0),
                ema20.unwrap_or(0.0),
                ema60.unwrap_or(0.0),
                vol_analysis.condition,
            ),
            _ => self.score_sell(
                current_price,
                rsi_result.latest,
                &macd_result,
                ema5.unwrap_or(0.0),
                ema20.unwrap_or(0.0),
                ema60.unwrap_or(0.0),
                vol_analysis.condition,
            ),
        };

        if signals >= 3 && strength >= 0.5 {
            let direction = if trend == TrendDirection::Up {
                SignalDirection::Buy
            } else {
                SignalDirection::Sell
            };
            let (stop_loss, take_profit) = match (direction, atr_result.latest) {
                (SignalDirection::Buy, Some(atr)) => {
                    (Some(current_price - atr * 2.0), Some(current_price + atr * 3.0))
                }
                (SignalDirection::Sell, Some(atr)) => {
                    (Some(current_price + atr * 2.0), Some(current_price - atr * 3.0))
                }
                // EMA60 is the structural fallback when ATR is unavailable.
                _ => (ema60, None),
            };
            return StrategySignal {
                direction,
                strength: strength.min(1.0),
                strategy_name: self.name().to_string(),
                reasons,
                entry_price: Some(current_price),
                stop_loss,
                take_profit,
                indicator_values,
                signal_count: signals,
            };
        }

        StrategySignal::hold(self.name(), "trend conditions not met", indicator_values)
    }

    fn determine_trend(
        &self,
        ema5: Option<f64>,
        ema20: Option<f64>,
        ema60: Option<f64>,
        current_price: f64,
    ) -> TrendDirection {
        let (Some(e5), Some(e20), Some(e60)) = (ema5, ema20, ema60) else {
            return TrendDirection::None;
        };
        if e5 > e20 && e20 > e60 {
            return TrendDirection::Up;
        }
        if e5 < e20 && e20 < e60 {
            return TrendDirection::Down;
        }
        if e5 > e20 && current_price > e60 {
            return TrendDirection::Up;
        }
        if e5 < e20 && current_price < e60 {
            return TrendDirection::Down;
        }
        TrendDirection::None
    }

    #[allow(clippy::too_many_arguments)]
    fn score_buy(
        &self,
        current_price: f64,
        rsi: Option<f64>,
        macd_result: &macd::MacdResult,
        ema5: f64,
        ema20: f64,
        ema60: f64,
        volume_condition: VolumeCondition,
    ) -> (usize, Vec<String>, f64) {
        let mut signals = 0;
        let mut reasons = Vec::new();
        let mut strength: f64 = 0.0;

        if ema5 > ema20 && ema20 > ema60 {
            signals += 1;
            strength += 0.25;
            reasons.push(format!(
                "perfect bullish EMA stack ({:.2} > {:.2} > {:.2})",
                ema5, ema20, ema60
            ));
        } else if ema5 > ema20 {
            strength += 0.15;
            reasons.push("partial bullish EMA stack (EMA5 > EMA20)".to_string());
        }

        if ema20 > 0.0 {
            let distance = (current_price - ema20).abs() / ema20;
            if distance <= self.params.ema_pullback_threshold {
                signals += 1;
                strength += 0.25;
                reasons.push(format!("pullback to EMA20 ({:.1}% away)", distance * 100.0));
            } else if distance <= self.params.ema_pullback_threshold * 2.0 {
                strength += 0.10;
                reasons.push(format!("close to EMA20 ({:.1}% away)", distance * 100.0));
            }
        }

        if let Some(rsi) = rsi {
            if rsi > self.params.rsi_healthy_low && rsi < self.params.rsi_healthy_high {
                signals += 1;
                strength += 0.20;
                reasons.push(format!("RSI in the healthy band ({:.1})", rsi));
            } else if rsi < self.params.rsi_healthy_low {
                strength += 0.10;
                reasons.push(format!("RSI low but acceptable ({:.1})", rsi));
            }
        }

        if self.params.macd_confirmation {
            if let Some(value) = macd_result.latest {
                if value.histogram > 0.0 {
                    signals += 1;
                    strength += 0.20;
                    reasons.push(format!("MACD histogram positive ({:.4})", value.histogram));
                } else if let Some(prev) = previous_histogram(macd_result) {
                    if value.histogram > prev {
                        strength += 0.10;
                        reasons.push("MACD histogram converging upward".to_string());
                    }
                }
            }
        }

        if volume_condition.is_low() {
            strength += 0.10;
            reasons.push("volume contracting (healthy pullback)".to_string());
        }

        (signals, reasons, strength.min(1.0))
    }

    #[allow(clippy::too_many_arguments)]
    fn score_sell(
        &self,
        current_price: f64,
        rsi: Option<f64>,
        macd_result: &macd::MacdResult,
        ema5: f64,
        ema20: f64,
        ema60: f64,
        volume_condition: VolumeCondition,
    ) -> (usize, Vec<String>, f64) {
        let mut signals = 0;
        let mut reasons = Vec::new();
        let mut strength: f64 = 0.0;

        if ema5 < ema20 && ema20 < ema60 {
            signals += 1;
            strength += 0.25;
            reasons.push(format!(
                "perfect bearish EMA stack ({:.2} < {:.2} < {:.2})",
                ema5, ema20, ema60
            ));
        } else if ema5 < ema20 {
            strength += 0.15;
            reasons.push("partial bearish EMA stack (EMA5 < EMA20)".to_string());
        }

        if ema20 > 0.0 {
            let distance = (current_price - ema20).abs() / ema20;
            if distance <= self.params.ema_pullback_threshold {
                signals += 1;
                strength += 0.25;
                reasons.push(format!("rally back to EMA20 ({:.1}% away)", distance * 100.0));
            } else if distance <= self.params.ema_pullback_threshold * 2.0 {
                strength += 0.10;
                reasons.push(format!("close to EMA20 ({:.1}% away)", distance * 100.0));
            }
        }

        // The sell-side healthy band sits lower: a downtrend keeps RSI
        // depressed without being exhausted.
        if let Some(rsi) = rsi {
            if rsi > 30.0 && rsi < 60.0 {
                signals += 1;
                strength += 0.20;
                reasons.push(format!("RSI in the healthy band ({:.1})", rsi));
            } else if rsi > 60.0 {
                strength += 0.10;
                reasons.push(format!("RSI high but acceptable ({:.1})", rsi));
            }
        }

        if self.params.macd_confirmation {
            if let Some(value) = macd_result.latest {
                if value.histogram < 0.0 {
                    signals += 1;
                    strength += 0.20;
                    reasons.push(format!("MACD histogram negative ({:.4})", value.histogram));
                } else if let Some(prev) = previous_histogram(macd_result) {
                    if value.histogram < prev {
                        strength += 0.10;
                        reasons.push("MACD histogram converging downward".to_string());
                    }
                }
            }
        }

        if volume_condition.is_low() {
            strength += 0.10;
            reasons.push("volume contracting (healthy rally)".to_string());
        }

        (signals, reasons, strength.min(1.0))
    }
}

fn previous_histogram(result: &macd::MacdResult) -> Option<f64> {
    let n = result.histogram.len();
    if n < 2 {
        return None;
    }
    result.histogram[n - 2]
}
