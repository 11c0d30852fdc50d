use std::collections::HashMap;

use crate::config::MtfConfig;
use crate::indicators::{ema, macd, rsi};
use crate::models::{ConfirmationOutcome, PriceArrays, SignalDirection, Timeframe};

/// One higher timeframe's verdict on the primary signal.
#[derive(Debug, Clone)]
pub struct TimeframeConfirmation {
    pub timeframe: Timeframe,
    pub outcome: ConfirmationOutcome,
    pub score: f64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MtfResult {
    pub is_confirmed: bool,
    pub final_score: f64,
    pub confirmation_count: usize,
    pub rejection_count: usize,
    pub timeframe_results: HashMap<Timeframe, TimeframeConfirmation>,
    pub adjusted_strength: f64,
}

/// Re-evaluates a primary signal against higher-timeframe snapshots. A
/// confirmation never creates a signal; it can only veto or dampen one.
pub struct MtfConfirmer {
    pub config: MtfConfig,
    pub primary: Timeframe,
    rsi_period: usize,
    macd_fast: usize,
    macd_slow: usize,
    macd_signal: usize,
    ema_medium: usize,
    ema_slow: usize,
}

impl MtfConfirmer {
    pub fn new(config: MtfConfig, primary: Timeframe, cfg: &crate::config::IndicatorParams) -> Self {
        Self {
            config,
            primary,
            rsi_period: cfg.rsi_period,
            macd_fast: cfg.macd_fast,
            macd_slow: cfg.macd_slow,
            macd_signal: cfg.macd_signal,
            ema_medium: cfg.ema_medium,
            ema_slow: cfg.ema_slow,
        }
    }

    pub fn confirm(
        &self,
        direction: SignalDirection,
        primary_strength: f64,
        timeframe_data: &HashMap<Timeframe, PriceArrays>,
    ) -> MtfResult {
        if direction == SignalDirection::Hold {
            return MtfResult {
                is_confirmed: false,
                final_score: 0.0,
                confirmation_count: 0,
                rejection_count: 0,
                timeframe_results: HashMap::new(),
                adjusted_strength: 0.0,
            };
        }

        let mut timeframe_results = HashMap::new();
        let mut confirmation_count = 0;
        let mut rejection_count = 0;

        for tf in &self.config.confirmation_timeframes {
            let Some(arrays) = timeframe_data.get(tf) else {
                continue;
            };
            if arrays.closes.len() < 30 {
                timeframe_results.insert(
                    *tf,
                    TimeframeConfirmation {
                        timeframe: *tf,
                        outcome: ConfirmationOutcome::Neutral,
                        score: 0.5,
                        reasons: vec![format!("{} history too short", tf)],
                    },
                );
                continue;
            }

            let confirmation = self.check_timeframe(*tf, direction, arrays);
            match confirmation.outcome {
                ConfirmationOutcome::Confirmed => confirmation_count += 1,
                ConfirmationOutcome::Rejected => rejection_count += 1,
                ConfirmationOutcome::Neutral => {}
            }
            timeframe_results.insert(*tf, confirmation);
        }

        let mut final_score = self.weighted_score(primary_strength, &timeframe_results);
        let mut is_confirmed = confirmation_count >= self.config.min_confirmations;

        if rejection_count > 0 {
            if rejection_count >= self.config.confirmation_timeframes.len() {
                is_confirmed = false;
                final_score *= 0.3;
            } else {
                final_score *= 1.0 - 0.2 * rejection_count as f64;
            }
        }

        MtfResult {
            is_confirmed,
            final_score,
            confirmation_count,
            rejection_count,
            timeframe_results,
            adjusted_strength: primary_strength * final_score,
        }
    }

    fn check_timeframe(
        &self,
        timeframe: Timeframe,
        direction: SignalDirection,
        arrays: &PriceArrays,
    ) -> TimeframeConfirmation {
        let closes = &arrays.closes;
        let current_price = closes[closes.len() - 1];
        let buying = direction == SignalDirection::Buy;

        let mut score: f64 = 0.5;
        let mut checks_passed = 0usize;
        let mut checks_total = 0usize;
        let mut reasons = Vec::new();

        // Trend: close against the EMA20/EMA60 ladder.
        checks_total += 1;
        let ema20 = ema::calculate(closes, self.ema_medium).latest;
        let ema60 = ema::calculate(closes, self.ema_slow).latest;
        if let (Some(e20), Some(e60)) = (ema20, ema60) {
            let strict = if buying {
                current_price > e20 && e20 > e60
            } else {
                current_price < e20 && e20 < e60
            };
            let loose = if buying {
                current_price > e60
            } else {
                current_price < e60
            };
            if strict {
                checks_passed += 1;
                score += 0.15;
                reasons.push(format!("trend aligned ({})", if buying { "up" } else { "down" }));
            } else if loose {
                score += 0.05;
                reasons.push("price on the right side of the slow EMA".to_string());
            } else {
                score -= 0.10;
                reasons.push("trend against the signal".to_string());
            }
        }

        // RSI extreme guard: refuse to chase an exhausted move.
        checks_total += 1;
        if let Some(rsi) = rsi::calculate(closes, self.rsi_period).latest {
            if buying {
                if rsi > 75.0 {
                    score -= 0.15;
                    reasons.push(format!("RSI too high to chase ({:.1})", rsi));
                } else if rsi < 30.0 {
                    checks_passed += 1;
                    score += 0.10;
                    reasons.push(format!("RSI oversold supports entry ({:.1})", rsi));
                } else {
                    checks_passed += 1;
                    score += 0.05;
                    reasons.push(format!("RSI unremarkable ({:.1})", rsi));
                }
            } else if rsi < 25.0 {
                score -= 0.15;
                reasons.push(format!("RSI too low to chase ({:.1})", rsi));
            } else if rsi > 70.0 {
                checks_passed += 1;
                score += 0.10;
                reasons.push(format!("RSI overbought supports entry ({:.1})", rsi));
            } else {
                checks_passed += 1;
                score += 0.05;
                reasons.push(format!("RSI unremarkable ({:.1})", rsi));
            }
        }

        // MACD histogram direction.
        checks_total += 1;
        let macd_result = macd::calculate(closes, self.macd_fast, self.macd_slow, self.macd_signal);
        if let Some(value) = macd_result.latest {
            let aligned = if buying {
                value.histogram > 0.0
            } else {
                value.histogram < 0.0
            };
            if aligned {
                checks_passed += 1;
                score += 0.10;
                reasons.push("MACD histogram aligned".to_string());
            } else {
                score -= 0.05;
                reasons.push("MACD histogram against the signal".to_string());
            }
        }

        // Volume trend is only meaningful on the slowest confirmation frame.
        if timeframe == Timeframe::H1 && arrays.volumes.len() >= 6 {
            checks_total += 1;
            let v = &arrays.volumes;
            let recent = v[v.len() - 3..].iter().sum::<f64>() / 3.0;
            let older = v[v.len() - 6..v.len() - 3].iter().sum::<f64>() / 3.0;
            if recent > older * 1.2 {
                checks_passed += 1;
                score += 0.05;
                reasons.push("volume building".to_string());
            } else if recent < older * 0.7 {
                reasons.push("volume fading".to_string());
            }
        }

        let pass_rate = if checks_total > 0 {
            checks_passed as f64 / checks_total as f64
        } else {
            0.5
        };

        let outcome = if score >= 0.65 && pass_rate >= 0.5 {
            ConfirmationOutcome::Confirmed
        } else if score < 0.4 || pass_rate < 0.3 {
            ConfirmationOutcome::Rejected
        } else {
            ConfirmationOutcome::Neutral
        };

        TimeframeConfirmation {
            timeframe,
            outcome,
            score: score.clamp(0.0, 1.0),
            reasons,
        }
    }

    /// Weighted blend of the primary strength and the per-frame scores,
    /// normalized by the weights actually used.
    fn weighted_score(
        &self,
        primary_strength: f64,
        results: &HashMap<Timeframe, TimeframeConfirmation>,
    ) -> f64 {
        let primary_weight = self.config.weights.get(&self.primary).copied().unwrap_or(0.4);
        let mut total_score = primary_strength * primary_weight;
        let mut total_weight = primary_weight;

        for (tf, confirmation) in results {
            let weight = self.config.weights.get(tf).copied().unwrap_or(0.25);
            total_score += confirmation.score * weight;
            total_weight += weight;
        }

        if total_weight > 0.0 {
            total_score / total_weight
        } else {
            primary_strength
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{default_test_config, zigzag_trend_series};

    fn confirmer() -> MtfConfirmer {
        let cfg = default_test_config();
        MtfConfirmer::new(cfg.mtf.clone(), cfg.primary_interval, &cfg.indicators)
    }

    fn arrays_from(series: (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>)) -> PriceArrays {
        let (highs, lows, closes, volumes) = series;
        PriceArrays {
            opens: closes.clone(),
            highs,
            lows,
            closes,
            volumes,
        }
    }

    #[test]
    fn aligned_timeframes_confirm_buy() {
        let mut data = HashMap::new();
        data.insert(Timeframe::M15, arrays_from(zigzag_trend_series(80, 1.0)));
        data.insert(Timeframe::H1, arrays_from(zigzag_trend_series(80, 1.0)));

        let result = confirmer().confirm(SignalDirection::Buy, 0.8, &data);
        assert!(result.is_confirmed, "results: {:?}", result.timeframe_results);
        assert!(result.confirmation_count >= 1);
        assert_eq!(result.rejection_count, 0);
        assert!(result.adjusted_strength > 0.0);
        assert!(result.adjusted_strength <= 0.8);
    }

    #[test]
    fn opposing_timeframes_dampen() {
        let mut aligned = HashMap::new();
        aligned.insert(Timeframe::M15, arrays_from(zigzag_trend_series(80, 1.0)));
        aligned.insert(Timeframe::H1, arrays_from(zigzag_trend_series(80, 1.0)));
        let confirmed = confirmer().confirm(SignalDirection::Buy, 0.8, &aligned);

        let mut opposing = HashMap::new();
        opposing.insert(Timeframe::M15, arrays_from(zigzag_trend_series(80, -1.0)));
        opposing.insert(Timeframe::H1, arrays_from(zigzag_trend_series(80, -1.0)));
        let dampened = confirmer().confirm(SignalDirection::Buy, 0.8, &opposing);

        assert!(dampened.adjusted_strength < confirmed.adjusted_strength);
        assert!(!dampened.is_confirmed);
    }

    #[test]
    fn hold_needs_no_confirmation() {
        let result = confirmer().confirm(SignalDirection::Hold, 0.5, &HashMap::new());
        assert!(!result.is_confirmed);
        assert_eq!(result.adjusted_strength, 0.0);
    }

    #[test]
    fn missing_data_passes_through_strength_weighting() {
        // No higher-timeframe arrays at all: score collapses to the primary
        // strength and nothing is confirmed.
        let result = confirmer().confirm(SignalDirection::Buy, 0.6, &HashMap::new());
        assert_eq!(result.confirmation_count, 0);
        assert!(!result.is_confirmed);
        assert!((result.final_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn short_history_is_neutral() {
        let mut data = HashMap::new();
        data.insert(Timeframe::M15, arrays_from(zigzag_trend_series(10, 1.0)));
        let result = confirmer().confirm(SignalDirection::Buy, 0.6, &data);
        let conf = &result.timeframe_results[&Timeframe::M15];
        assert_eq!(conf.outcome, ConfirmationOutcome::Neutral);
        assert!((conf.score - 0.5).abs() < 1e-9);
    }
}
