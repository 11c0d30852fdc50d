use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::indicators::IndicatorSnapshot;
use crate::models::{SignalDirection, TrendDirection};

/// Multi-indicator voting score on a 0-100 scale. Tuned for the short
/// verification horizons: a signal only clears when enough independent
/// indicator families agree on one direction at the same time.
///
/// Score budget: trend alignment 25, indicator resonance 50 (core families
/// 7 each, auxiliary 6, VWAP 5), momentum 15, timing 10.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceScore {
    pub direction: SignalDirection,
    pub score: f64,
    pub confidence: f64,
    pub resonance_count: usize,
    pub trend: TrendDirection,
    pub trend_aligned: bool,
    pub momentum_confirmed: bool,
    pub volatility_ok: bool,
    pub reasons: Vec<String>,
}

/// Per-bar inputs that are not indicator values.
#[derive(Debug, Clone, Copy)]
pub struct BarContext {
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub previous_close: Option<f64>,
}

struct IndicatorVote {
    direction: SignalDirection,
    strength: f64,
    reason: String,
}

impl IndicatorVote {
    fn neutral() -> Self {
        Self {
            direction: SignalDirection::Hold,
            strength: 0.0,
            reason: String::new(),
        }
    }
}

pub struct ResonanceScorer {
    pub min_resonance: usize,
    pub min_score: f64,
    pub use_trend_filter: bool,
    pub use_momentum_filter: bool,
    pub use_volatility_filter: bool,
    pub min_volatility: f64,
    pub max_volatility: f64,
    toggles: crate::config::IndicatorToggles,
}

impl ResonanceScorer {
    pub fn new(config: &Config) -> Self {
        Self {
            min_resonance: config.effective_min_resonance(),
            min_score: config.min_score,
            use_trend_filter: true,
            use_momentum_filter: true,
            use_volatility_filter: true,
            min_volatility: 0.0005,
            max_volatility: 0.05,
            toggles: config.toggles.clone(),
        }
    }

    /// Score one bar from the current and previous indicator snapshots.
    pub fn score(
        &self,
        current: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
        bar: &BarContext,
    ) -> ResonanceScore {
        let mut reasons = Vec::new();
        let mut buy_votes = 0usize;
        let mut sell_votes = 0usize;
        let mut indicator_score = 0.0;

        let (trend, trend_score) = if self.toggles.use_ema {
            self.trend_alignment(current, bar.close)
        } else {
            (TrendDirection::None, 0.0)
        };

        let mut tally = |vote: IndicatorVote, weight: f64| {
            if vote.direction == SignalDirection::Hold {
                return;
            }
            indicator_score += vote.strength / 100.0 * weight;
            match vote.direction {
                SignalDirection::Buy => buy_votes += 1,
                SignalDirection::Sell => sell_votes += 1,
                SignalDirection::Hold => {}
            }
            reasons.push(vote.reason);
        };

        if self.toggles.use_rsi {
            tally(self.rsi_vote(current, previous), 7.0);
        }
        if self.toggles.use_kdj {
            tally(self.kdj_vote(current, previous), 7.0);
        }
        if self.toggles.use_macd {
            tally(self.macd_vote(current, previous), 7.0);
        }
        if self.toggles.use_boll {
            tally(self.bollinger_vote(current), 7.0);
        }
        if self.toggles.use_cci {
            tally(self.cci_vote(current, previous), 6.0);
        }
        if self.toggles.use_atr {
            tally(self.atr_vote(current, previous, bar), 6.0);
        }
        if self.toggles.use_vwap {
            tally(self.vwap_vote(current, bar), 5.0);
        }

        let (momentum_confirmed, momentum_score) = self.momentum(current, bar);
        let volatility_ok = self.volatility_ok(bar, &mut reasons);

        let resonance_count = buy_votes.max(sell_votes);
        let timing_score = if resonance_count >= 4 {
            10.0
        } else if resonance_count >= 3 {
            7.0
        } else {
            0.0
        };

        // Buy side is checked first: when both sides clear the bar, the
        // long reading wins.
        let mut direction = if buy_votes >= self.min_resonance {
            SignalDirection::Buy
        } else if sell_votes >= self.min_resonance {
            SignalDirection::Sell
        } else {
            SignalDirection::Hold
        };
        let mut total = 0.0;
        if direction != SignalDirection::Hold {
            total = trend_score + indicator_score + momentum_score + timing_score;

            let with_trend = (direction == SignalDirection::Buy && trend == TrendDirection::Up)
                || (direction == SignalDirection::Sell && trend == TrendDirection::Down);
            if self.use_trend_filter && !with_trend {
                total *= 0.5;
                reasons.push("counter-trend entry, score halved".to_string());
            }
            if self.use_momentum_filter && !momentum_confirmed {
                total *= 0.8;
                reasons.push("momentum unconfirmed, score reduced".to_string());
            }
        }

        if !volatility_ok {
            direction = SignalDirection::Hold;
            total = 0.0;
        }
        if direction != SignalDirection::Hold && total < self.min_score {
            reasons.push(format!(
                "score {:.1} under the {:.0} floor",
                total, self.min_score
            ));
            direction = SignalDirection::Hold;
        }

        let trend_aligned = (direction == SignalDirection::Buy && trend == TrendDirection::Up)
            || (direction == SignalDirection::Sell && trend == TrendDirection::Down);

        ResonanceScore {
            direction,
            score: total,
            confidence: (total / 100.0).min(1.0),
            resonance_count,
            trend,
            trend_aligned,
            momentum_confirmed,
            volatility_ok,
            reasons,
        }
    }

    /// EMA ladder plus price position, up to 6 points mapped onto 25.
    fn trend_alignment(&self, snap: &IndicatorSnapshot, close: f64) -> (TrendDirection, f64) {
        let (Some(e5), Some(e20), Some(e60)) = (snap.ema5, snap.ema20, snap.ema60) else {
            return (TrendDirection::None, 0.0);
        };

        let mut bullish = 0u32;
        let mut bearish = 0u32;

        if e5 > e20 && e20 > e60 {
            bullish += 3;
        } else if e5 < e20 && e20 < e60 {
            bearish += 3;
        } else {
            if e5 > e20 {
                bullish += 1;
            } else {
                bearish += 1;
            }
            if e20 > e60 {
                bullish += 1;
            } else {
                bearish += 1;
            }
            if e5 > e60 {
                bullish += 1;
            } else {
                bearish += 1;
            }
        }

        if close > e60 {
            bullish += 2;
        } else if close < e60 {
            bearish += 2;
        }
        if close > e5 {
            bullish += 1;
        } else if close < e5 {
            bearish += 1;
        }

        if bullish > bearish {
            (TrendDirection::Up, bullish as f64 / 6.0 * 25.0)
        } else if bearish > bullish {
            (TrendDirection::Down, bearish as f64 / 6.0 * 25.0)
        } else {
            (TrendDirection::None, 0.0)
        }
    }

    fn rsi_vote(
        &self,
        current: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
    ) -> IndicatorVote {
        let Some(rsi) = current.rsi else {
            return IndicatorVote::neutral();
        };

        if rsi < 20.0 {
            return IndicatorVote {
                direction: SignalDirection::Buy,
                strength: 100.0,
                reason: format!("RSI deeply oversold ({:.1})", rsi),
            };
        }
        if rsi < 30.0 {
            return IndicatorVote {
                direction: SignalDirection::Buy,
                strength: (70.0 + (30.0 - rsi) * 3.0).min(100.0),
                reason: format!("RSI oversold ({:.1})", rsi),
            };
        }
        if rsi > 80.0 {
            return IndicatorVote {
                direction: SignalDirection::Sell,
                strength: 100.0,
                reason: format!("RSI deeply overbought ({:.1})", rsi),
            };
        }
        if rsi > 70.0 {
            return IndicatorVote {
                direction: SignalDirection::Sell,
                strength: (70.0 + (rsi - 70.0) * 3.0).min(100.0),
                reason: format!("RSI overbought ({:.1})", rsi),
            };
        }

        // Mid-band: a fast move counts for the side it is heading toward.
        if let Some(prev) = previous.and_then(|p| p.rsi) {
            let change = rsi - prev;
            if change > 5.0 && rsi < 50.0 {
                return IndicatorVote {
                    direction: SignalDirection::Buy,
                    strength: 50.0,
                    reason: format!("RSI climbing fast ({:.1}, +{:.1})", rsi, change),
                };
            }
            if change < -5.0 && rsi > 50.0 {
                return IndicatorVote {
                    direction: SignalDirection::Sell,
                    strength: 50.0,
                    reason: format!("RSI dropping fast ({:.1}, {:.1})", rsi, change),
                };
            }
        }
        IndicatorVote::neutral()
    }

    fn kdj_vote(
        &self,
        current: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
    ) -> IndicatorVote {
        let (Some(k), Some(d), Some(j)) = (current.kdj_k, current.kdj_d, current.kdj_j) else {
            return IndicatorVote::neutral();
        };

        let mut vote = IndicatorVote::neutral();
        if k < 20.0 && d < 20.0 {
            vote = IndicatorVote {
                direction: SignalDirection::Buy,
                strength: 80.0,
                reason: format!("KDJ double oversold (K={:.1} D={:.1})", k, d),
            };
        } else if k > 80.0 && d > 80.0 {
            vote = IndicatorVote {
                direction: SignalDirection::Sell,
                strength: 80.0,
                reason: format!("KDJ double overbought (K={:.1} D={:.1})", k, d),
            };
        }

        if j < 0.0 {
            vote = IndicatorVote {
                strength: if vote.direction == SignalDirection::Buy {
                    100.0
                } else {
                    90.0
                },
                direction: SignalDirection::Buy,
                reason: format!("KDJ J pinned below zero ({:.1})", j),
            };
        } else if j > 100.0 {
            vote = IndicatorVote {
                strength: if vote.direction == SignalDirection::Sell {
                    100.0
                } else {
                    90.0
                },
                direction: SignalDirection::Sell,
                reason: format!("KDJ J pinned above 100 ({:.1})", j),
            };
        }

        if let Some((prev_k, prev_d)) =
            previous.and_then(|p| p.kdj_k.zip(p.kdj_d))
        {
            if prev_k < prev_d && k > d {
                vote = if k < 30.0 {
                    IndicatorVote {
                        direction: SignalDirection::Buy,
                        strength: 100.0,
                        reason: "KDJ golden cross from the floor".to_string(),
                    }
                } else if vote.direction == SignalDirection::Buy {
                    IndicatorVote {
                        strength: (vote.strength + 20.0).min(100.0),
                        reason: format!("{} + golden cross", vote.reason),
                        ..vote
                    }
                } else {
                    IndicatorVote {
                        direction: SignalDirection::Buy,
                        strength: 85.0,
                        reason: "KDJ golden cross".to_string(),
                    }
                };
            } else if prev_k > prev_d && k < d {
                vote = if k > 70.0 {
                    IndicatorVote {
                        direction: SignalDirection::Sell,
                        strength: 100.0,
                        reason: "KDJ dead cross from the ceiling".to_string(),
                    }
                } else if vote.direction == SignalDirection::Sell {
                    IndicatorVote {
                        strength: (vote.strength + 20.0).min(100.0),
                        reason: format!("{} + dead cross", vote.reason),
                        ..vote
                    }
                } else {
                    IndicatorVote {
                        direction: SignalDirection::Sell,
                        strength: 85.0,
                        reason: "KDJ dead cross".to_string(),
                    }
                };
            }
        }

        vote
    }

    fn macd_vote(
        &self,
        current: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
    ) -> IndicatorVote {
        let (Some(macd), Some(signal), Some(histogram)) =
            (current.macd, current.macd_signal, current.macd_histogram)
        else {
            return IndicatorVote::neutral();
        };

        if let Some((prev_macd, prev_signal)) =
            previous.and_then(|p| p.macd.zip(p.macd_signal))
        {
            if prev_macd < prev_signal && macd > signal {
                return if macd > 0.0 {
                    IndicatorVote {
                        direction: SignalDirection::Buy,
                        strength: 100.0,
                        reason: "MACD golden cross above zero".to_string(),
                    }
                } else {
                    IndicatorVote {
                        direction: SignalDirection::Buy,
                        strength: 85.0,
                        reason: "MACD golden cross".to_string(),
                    }
                };
            }
            if prev_macd > prev_signal && macd < signal {
                return if macd < 0.0 {
                    IndicatorVote {
                        direction: SignalDirection::Sell,
                        strength: 100.0,
                        reason: "MACD dead cross below zero".to_string(),
                    }
                } else {
                    IndicatorVote {
                        direction: SignalDirection::Sell,
                        strength: 85.0,
                        reason: "MACD dead cross".to_string(),
                    }
                };
            }
        }

        if histogram > 0.0 && macd > signal {
            return IndicatorVote {
                direction: SignalDirection::Buy,
                strength: 60.0,
                reason: "MACD stacked bullish".to_string(),
            };
        }
        if histogram < 0.0 && macd < signal {
            return IndicatorVote {
                direction: SignalDirection::Sell,
                strength: 60.0,
                reason: "MACD stacked bearish".to_string(),
            };
        }
        IndicatorVote::neutral()
    }

    fn bollinger_vote(&self, current: &IndicatorSnapshot) -> IndicatorVote {
        let Some(percent_b) = current.bb_percent_b else {
            return IndicatorVote::neutral();
        };

        let (direction, strength, label) = if percent_b < 0.0 {
            (SignalDirection::Buy, 100.0, "below the lower band")
        } else if percent_b < 0.1 {
            (SignalDirection::Buy, 90.0, "on the lower band")
        } else if percent_b < 0.2 {
            (SignalDirection::Buy, 70.0, "near the lower band")
        } else if percent_b > 1.0 {
            (SignalDirection::Sell, 100.0, "above the upper band")
        } else if percent_b > 0.9 {
            (SignalDirection::Sell, 90.0, "on the upper band")
        } else if percent_b > 0.8 {
            (SignalDirection::Sell, 70.0, "near the upper band")
        } else {
            return IndicatorVote::neutral();
        };

        IndicatorVote {
            direction,
            strength,
            reason: format!("price {} (%B={:.2})", label, percent_b),
        }
    }

    fn cci_vote(
        &self,
        current: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
    ) -> IndicatorVote {
        let Some(cci) = current.cci else {
            return IndicatorVote::neutral();
        };

        if cci < -200.0 {
            return IndicatorVote {
                direction: SignalDirection::Buy,
                strength: 100.0,
                reason: format!("CCI deeply oversold ({:.0})", cci),
            };
        }
        if cci < -100.0 {
            return IndicatorVote {
                direction: SignalDirection::Buy,
                strength: (80.0 + (-100.0 - cci) / 100.0 * 20.0).min(100.0),
                reason: format!("CCI oversold ({:.0})", cci),
            };
        }
        if cci > 200.0 {
            return IndicatorVote {
                direction: SignalDirection::Sell,
                strength: 100.0,
                reason: format!("CCI deeply overbought ({:.0})", cci),
            };
        }
        if cci > 100.0 {
            return IndicatorVote {
                direction: SignalDirection::Sell,
                strength: (80.0 + (cci - 100.0) / 100.0 * 20.0).min(100.0),
                reason: format!("CCI overbought ({:.0})", cci),
            };
        }

        if let Some(prev) = previous.and_then(|p| p.cci) {
            if prev < 0.0 && cci > 0.0 {
                return IndicatorVote {
                    direction: SignalDirection::Buy,
                    strength: 75.0,
                    reason: format!("CCI crossed above zero ({:.0})", cci),
                };
            }
            if prev > 0.0 && cci < 0.0 {
                return IndicatorVote {
                    direction: SignalDirection::Sell,
                    strength: 75.0,
                    reason: format!("CCI crossed below zero ({:.0})", cci),
                };
            }
            if prev < -100.0 && cci > -100.0 {
                return IndicatorVote {
                    direction: SignalDirection::Buy,
                    strength: 85.0,
                    reason: format!("CCI rebounding from oversold ({:.0} -> {:.0})", prev, cci),
                };
            }
            if prev > 100.0 && cci < 100.0 {
                return IndicatorVote {
                    direction: SignalDirection::Sell,
                    strength: 85.0,
                    reason: format!("CCI falling out of overbought ({:.0} -> {:.0})", prev, cci),
                };
            }
            // Rapid mid-band swing without a zero cross still leans the move.
            if (cci - prev).abs() > 50.0 {
                if cci > prev && cci < 0.0 {
                    return IndicatorVote {
                        direction: SignalDirection::Buy,
                        strength: 60.0,
                        reason: format!("CCI climbing fast ({:.0} -> {:.0})", prev, cci),
                    };
                }
                if cci < prev && cci > 0.0 {
                    return IndicatorVote {
                        direction: SignalDirection::Sell,
                        strength: 60.0,
                        reason: format!("CCI dropping fast ({:.0} -> {:.0})", prev, cci),
                    };
                }
            }
        }
        IndicatorVote::neutral()
    }

    /// ATR votes through bar shape: a range well beyond ATR closing at one
    /// end of the bar is a directional expansion.
    fn atr_vote(
        &self,
        current: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
        bar: &BarContext,
    ) -> IndicatorVote {
        let Some(atr) = current.atr else {
            return IndicatorVote::neutral();
        };
        if atr <= 0.0 {
            return IndicatorVote::neutral();
        }

        let range = bar.high - bar.low;
        let position = if range > 0.0 {
            (bar.close - bar.low) / range
        } else {
            0.5
        };

        let mut vote = IndicatorVote::neutral();
        if let Some(prev_atr) = previous.and_then(|p| p.atr).filter(|&v| v > 0.0) {
            let atr_change = (atr - prev_atr) / prev_atr;
            if atr_change > 0.1 {
                if position > 0.7 {
                    vote = IndicatorVote {
                        direction: SignalDirection::Buy,
                        strength: 70.0,
                        reason: format!("volatility expanding with a high close (+{:.0}%)", atr_change * 100.0),
                    };
                } else if position < 0.3 {
                    vote = IndicatorVote {
                        direction: SignalDirection::Sell,
                        strength: 70.0,
                        reason: format!("volatility expanding with a low close (+{:.0}%)", atr_change * 100.0),
                    };
                }
            }
        }

        if range / atr > 1.5 {
            if position > 0.7 {
                vote = IndicatorVote {
                    direction: SignalDirection::Buy,
                    strength: (vote.strength + 30.0).clamp(75.0, 100.0),
                    reason: format!("wide bar closing high ({:.1}x ATR)", range / atr),
                };
            } else if position < 0.3 {
                vote = IndicatorVote {
                    direction: SignalDirection::Sell,
                    strength: (vote.strength + 30.0).clamp(75.0, 100.0),
                    reason: format!("wide bar closing low ({:.1}x ATR)", range / atr),
                };
            }
        }

        vote
    }

    fn vwap_vote(&self, current: &IndicatorSnapshot, bar: &BarContext) -> IndicatorVote {
        let Some(vwap) = current.vwap.filter(|&v| v > 0.0) else {
            return IndicatorVote::neutral();
        };
        let deviation = (bar.close - vwap) / vwap * 100.0;

        if let Some(prev_close) = bar.previous_close {
            if prev_close <= vwap && bar.close > vwap {
                return IndicatorVote {
                    direction: SignalDirection::Buy,
                    strength: 90.0,
                    reason: format!("close crossed above VWAP (+{:.2}%)", deviation),
                };
            }
            if prev_close >= vwap && bar.close < vwap {
                return IndicatorVote {
                    direction: SignalDirection::Sell,
                    strength: 90.0,
                    reason: format!("close crossed below VWAP ({:.2}%)", deviation),
                };
            }
        }

        if deviation > 2.0 {
            IndicatorVote {
                direction: SignalDirection::Sell,
                strength: 70.0,
                reason: format!("stretched far above VWAP (+{:.2}%)", deviation),
            }
        } else if deviation > 0.5 {
            IndicatorVote {
                direction: SignalDirection::Buy,
                strength: 60.0,
                reason: format!("holding above VWAP (+{:.2}%)", deviation),
            }
        } else if deviation < -2.0 {
            IndicatorVote {
                direction: SignalDirection::Buy,
                strength: 70.0,
                reason: format!("stretched far below VWAP ({:.2}%)", deviation),
            }
        } else if deviation < -0.5 {
            IndicatorVote {
                direction: SignalDirection::Sell,
                strength: 60.0,
                reason: format!("holding below VWAP ({:.2}%)", deviation),
            }
        } else {
            IndicatorVote::neutral()
        }
    }

    fn momentum(&self, current: &IndicatorSnapshot, bar: &BarContext) -> (bool, f64) {
        let Some(prev_close) = bar.previous_close else {
            return (false, 0.0);
        };
        if prev_close == 0.0 {
            return (false, 0.0);
        }

        let price_change = (bar.close - prev_close) / prev_close;
        let ema_distance = current
            .ema20
            .filter(|&e| e > 0.0)
            .map(|e| (bar.close - e) / e)
            .unwrap_or(0.0);

        let mut score: f64 = 0.0;
        let mut confirmed = false;
        if price_change.abs() > 0.001 {
            score += 8.0;
            confirmed = true;
        }
        if ema_distance.abs() > 0.002 {
            score += 7.0;
            if ema_distance.abs() > 0.005 {
                score += 3.0;
            }
        }
        (confirmed, score.min(15.0))
    }

    fn volatility_ok(&self, bar: &BarContext, reasons: &mut Vec<String>) -> bool {
        if !self.use_volatility_filter || bar.close <= 0.0 {
            return true;
        }
        let volatility = (bar.high - bar.low) / bar.close;
        if volatility < self.min_volatility {
            reasons.push(format!("bar too quiet to trade ({:.4})", volatility));
            false
        } else if volatility > self.max_volatility {
            reasons.push(format!("bar too violent to trade ({:.4})", volatility));
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::default_test_config;

    fn scorer_with(min_resonance: usize, min_score: f64) -> ResonanceScorer {
        let mut cfg = default_test_config();
        cfg.min_resonance = Some(min_resonance);
        cfg.min_score = min_score;
        ResonanceScorer::new(&cfg)
    }

    fn oversold_snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: Some(18.0),
            kdj_k: Some(12.0),
            kdj_d: Some(16.0),
            kdj_j: Some(-5.0),
            macd: Some(-2.0),
            macd_signal: Some(-2.5),
            macd_histogram: Some(0.5),
            bb_percent_b: Some(-0.05),
            ema5: Some(97.0),
            ema20: Some(96.0),
            ema60: Some(93.0),
            atr: Some(1.0),
            ..Default::default()
        }
    }

    #[test]
    fn broad_agreement_clears_the_bar() {
        let scorer = scorer_with(3, 50.0);
        let bar = BarContext {
            close: 94.0,
            high: 95.0,
            low: 93.5,
            previous_close: Some(94.5),
        };
        let score = scorer.score(&oversold_snapshot(), None, &bar);
        // RSI, KDJ, Bollinger, MACD all vote buy.
        assert_eq!(score.direction, SignalDirection::Buy, "reasons: {:?}", score.reasons);
        assert!(score.resonance_count >= 4);
        assert!(score.score >= 50.0);
        assert!(score.confidence > 0.0);
    }

    #[test]
    fn too_few_votes_is_hold() {
        let scorer = scorer_with(6, 50.0);
        let bar = BarContext {
            close: 94.0,
            high: 95.0,
            low: 93.5,
            previous_close: Some(94.5),
        };
        let score = scorer.score(&oversold_snapshot(), None, &bar);
        assert_eq!(score.direction, SignalDirection::Hold);
        assert_eq!(score.score, 0.0);
    }

    #[test]
    fn score_floor_filters_marginal_signals() {
        let scorer = scorer_with(3, 99.0);
        let bar = BarContext {
            close: 94.0,
            high: 95.0,
            low: 93.5,
            previous_close: Some(94.5),
        };
        let score = scorer.score(&oversold_snapshot(), None, &bar);
        assert_eq!(score.direction, SignalDirection::Hold);
        assert!(score.reasons.iter().any(|r| r.contains("floor")));
    }

    #[test]
    fn dead_bar_is_vetoed_by_volatility_filter() {
        let scorer = scorer_with(3, 50.0);
        let bar = BarContext {
            close: 94.0,
            high: 94.001,
            low: 94.0,
            previous_close: Some(94.0),
        };
        let score = scorer.score(&oversold_snapshot(), None, &bar);
        assert!(!score.volatility_ok);
        assert_eq!(score.direction, SignalDirection::Hold);
    }

    #[test]
    fn counter_trend_is_halved() {
        let scorer = scorer_with(3, 10.0);
        let bar = BarContext {
            close: 94.0,
            high: 95.0,
            low: 93.5,
            previous_close: Some(94.5),
        };
        // Same oversold voting stack, once under a bearish EMA ladder and
        // once under a bullish one.
        let mut bearish = oversold_snapshot();
        bearish.ema5 = Some(94.0);
        bearish.ema20 = Some(96.0);
        bearish.ema60 = Some(98.0);
        let against = scorer.score(&bearish, None, &bar);

        let mut bullish = oversold_snapshot();
        bullish.ema5 = Some(97.0);
        bullish.ema20 = Some(96.0);
        bullish.ema60 = Some(93.0);
        let with = scorer.score(&bullish, None, &bar);

        assert_eq!(against.direction, SignalDirection::Buy);
        assert_eq!(with.direction, SignalDirection::Buy);
        assert!(against.score < with.score);
        assert!(!against.trend_aligned);
    }

    #[test]
    fn split_vote_resolves_long_first() {
        // Two families vote buy, two vote sell, and both sides clear the
        // resonance bar: the buy side is consulted first and wins.
        let scorer = scorer_with(2, 5.0);
        let snapshot = IndicatorSnapshot {
            rsi: Some(18.0),
            bb_percent_b: Some(-0.05),
            kdj_k: Some(85.0),
            kdj_d: Some(85.0),
            kdj_j: Some(90.0),
            macd: Some(-1.0),
            macd_signal: Some(-0.5),
            macd_histogram: Some(-0.5),
            ema5: Some(97.0),
            ema20: Some(96.0),
            ema60: Some(93.0),
            atr: Some(1.0),
            ..Default::default()
        };
        let bar = BarContext {
            close: 94.0,
            high: 95.0,
            low: 93.5,
            previous_close: Some(94.5),
        };
        let score = scorer.score(&snapshot, None, &bar);
        assert_eq!(score.resonance_count, 2);
        assert_eq!(score.direction, SignalDirection::Buy, "reasons: {:?}", score.reasons);
    }

    #[test]
    fn cci_mid_band_swing_votes() {
        let mut cfg = default_test_config();
        cfg.toggles.use_cci = true;
        let scorer = ResonanceScorer::new(&cfg);

        let current = IndicatorSnapshot {
            cci: Some(-20.0),
            ..Default::default()
        };
        let previous = IndicatorSnapshot {
            cci: Some(-80.0),
            ..Default::default()
        };
        let vote = scorer.cci_vote(&current, Some(&previous));
        assert_eq!(vote.direction, SignalDirection::Buy);
        assert!((vote.strength - 60.0).abs() < 1e-9);

        let current = IndicatorSnapshot {
            cci: Some(20.0),
            ..Default::default()
        };
        let previous = IndicatorSnapshot {
            cci: Some(80.0),
            ..Default::default()
        };
        let vote = scorer.cci_vote(&current, Some(&previous));
        assert_eq!(vote.direction, SignalDirection::Sell);

        // A small drift in the mid-band stays neutral.
        let current = IndicatorSnapshot {
            cci: Some(30.0),
            ..Default::default()
        };
        let previous = IndicatorSnapshot {
            cci: Some(10.0),
            ..Default::default()
        };
        let vote = scorer.cci_vote(&current, Some(&previous));
        assert_eq!(vote.direction, SignalDirection::Hold);
    }

    #[test]
    fn trend_alignment_scoring() {
        let cfg = default_test_config();
        let scorer = ResonanceScorer::new(&cfg);
        let snap = IndicatorSnapshot {
            ema5: Some(105.0),
            ema20: Some(103.0),
            ema60: Some(100.0),
            ..Default::default()
        };
        let (trend, score) = scorer.trend_alignment(&snap, 106.0);
        assert_eq!(trend, TrendDirection::Up);
        // Perfect ladder (3) + above slow (2) + above fast (1) = 6/6.
        assert!((score - 25.0).abs() < 1e-9);
    }
}
