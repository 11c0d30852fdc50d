use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::config::Config;
use crate::indicators::{adx, atr, bollinger, cci, ema, kdj, macd, rsi, volume, vwap, IndicatorSnapshot};
use crate::models::{MarketState, PriceArrays, SignalDirection, SignalGrade, Timeframe};
use crate::strategy::breakout::BreakoutStrategy;
use crate::strategy::market_state::{MarketStateDetector, MarketStateResult};
use crate::strategy::multi_timeframe::{MtfConfirmer, MtfResult};
use crate::strategy::ranging::RangingStrategy;
use crate::strategy::signal::{Prediction, StrategySignal, TradingSignal};
use crate::strategy::trending::TrendingStrategy;

/// Orchestrates one pipeline pass: indicator pack, regime, strategy, MTF
/// confirmation, grading, predictions.
pub struct SignalGenerator {
    symbol: String,
    config: Config,
    state_detector: MarketStateDetector,
    ranging: RangingStrategy,
    trending: TrendingStrategy,
    breakout: BreakoutStrategy,
    mtf: MtfConfirmer,
    next_id: u64,
}

impl SignalGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            symbol: config.symbol.clone(),
            state_detector: MarketStateDetector::new(
                config.market_state.clone(),
                config.indicators.adx_period,
                config.indicators.atr_period,
                config.indicators.volume_ma_period,
            ),
            ranging: RangingStrategy::new(config.ranging.clone(), &config.indicators),
            trending: TrendingStrategy::new(config.trending.clone(), &config.indicators),
            breakout: BreakoutStrategy::new(config.breakout.clone(), &config.indicators),
            mtf: MtfConfirmer::new(
                config.mtf.clone(),
                config.primary_interval,
                &config.indicators,
            ),
            config: config.clone(),
            next_id: 1,
        }
    }

    pub fn generate(
        &mut self,
        primary: &PriceArrays,
        timeframe_data: &HashMap<Timeframe, PriceArrays>,
        now: DateTime<Utc>,
    ) -> TradingSignal {
        let id = self.take_id();

        if primary.closes.len() < 60 {
            return self.no_signal(
                id,
                now,
                "not enough history",
                MarketState::Unknown,
                None,
                "none",
                IndicatorSnapshot::default(),
            );
        }
        let current_price = primary.closes[primary.closes.len() - 1];

        // The dashboard pack runs unconditionally so every downstream
        // consumer sees a full snapshot even on HOLD.
        let dashboard = self.dashboard_indicators(primary);

        let state_result = self.state_detector.detect(
            &primary.highs,
            &primary.lows,
            &primary.closes,
            &primary.volumes,
        );
        let base = IndicatorSnapshot {
            adx: state_result.adx,
            plus_di: state_result.plus_di,
            minus_di: state_result.minus_di,
            market_state_confidence: Some(state_result.confidence),
            ..Default::default()
        };
        let base = dashboard.merged_with(&base);

        let (strategy_name, strategy_signal) = self.run_strategy(&state_result, primary);
        let Some(strategy_signal) = strategy_signal else {
            return self.no_signal(
                id,
                now,
                &format!("strategy {} disabled", strategy_name),
                state_result.state,
                Some(&state_result),
                strategy_name,
                base,
            );
        };

        let indicator_values = base.merged_with(&strategy_signal.indicator_values);

        if strategy_signal.direction == SignalDirection::Hold {
            let reason = strategy_signal
                .reasons
                .first()
                .cloned()
                .unwrap_or_else(|| "no signal".to_string());
            return self.no_signal(
                id,
                now,
                &reason,
                state_result.state,
                Some(&state_result),
                strategy_name,
                indicator_values,
            );
        }

        // Higher timeframes confirm or dampen; they never originate.
        let mut mtf_result: Option<MtfResult> = None;
        let mut is_confirmed = true;
        let mut confirmation_count = 0;
        let mut timeframe_confirmations = HashMap::new();
        let adjusted_strength = if self.config.mtf.enabled && !timeframe_data.is_empty() {
            let result =
                self.mtf
                    .confirm(strategy_signal.direction, strategy_signal.strength, timeframe_data);
            is_confirmed = result.is_confirmed;
            confirmation_count = result.confirmation_count;
            for (tf, conf) in &result.timeframe_results {
                timeframe_confirmations
                    .insert(*tf, conf.outcome == crate::models::ConfirmationOutcome::Confirmed);
            }
            let adjusted = result.adjusted_strength;
            mtf_result = Some(result);
            adjusted
        } else {
            strategy_signal.strength
        };

        let grade = self.grade(adjusted_strength);
        let predictions = self.predictions(
            strategy_signal.direction,
            adjusted_strength,
            current_price,
            indicator_values.atr,
        );
        let warnings = self.warnings(&state_result, mtf_result.as_ref(), grade);

        TradingSignal {
            id,
            timestamp: now,
            symbol: self.symbol.clone(),
            direction: strategy_signal.direction,
            strength: strategy_signal.strength,
            adjusted_strength,
            grade,
            market_state: state_result.state,
            strategy_used: strategy_name.to_string(),
            is_confirmed,
            confirmation_count,
            timeframe_confirmations,
            entry_price: strategy_signal.entry_price.unwrap_or(current_price),
            stop_loss: strategy_signal.stop_loss,
            take_profit: strategy_signal.take_profit,
            predictions,
            reasons: strategy_signal.reasons,
            warnings,
            indicator_values,
        }
    }

    fn take_id(&mut self) -> String {
        let id = format!("SIG-{:06}", self.next_id);
        self.next_id += 1;
        id
    }

    /// RANGING -> ranging, TRENDING_* -> trending, BREAKOUT_* -> breakout,
    /// UNKNOWN falls back to trending. Returns None when the selected
    /// strategy is disabled in config.
    fn run_strategy(
        &self,
        state: &MarketStateResult,
        primary: &PriceArrays,
    ) -> (&'static str, Option<StrategySignal>) {
        match state.state {
            MarketState::Ranging => {
                if !self.config.ranging.enabled {
                    return ("ranging", None);
                }
                (
                    "ranging",
                    Some(self.ranging.analyze(
                        &primary.highs,
                        &primary.lows,
                        &primary.closes,
                        &primary.volumes,
                    )),
                )
            }
            MarketState::BreakoutUp | MarketState::BreakoutDown => {
                if !self.config.breakout.enabled {
                    return ("breakout", None);
                }
                (
                    "breakout",
                    Some(self.breakout.analyze(
                        &primary.highs,
                        &primary.lows,
                        &primary.closes,
                        &primary.volumes,
                    )),
                )
            }
            _ => {
                if !self.config.trending.enabled {
                    return ("trending", None);
                }
                (
                    "trending",
                    Some(self.trending.analyze(
                        &primary.highs,
                        &primary.lows,
                        &primary.closes,
                        &primary.volumes,
                    )),
                )
            }
        }
    }

    fn dashboard_indicators(&self, primary: &PriceArrays) -> IndicatorSnapshot {
        let params = &self.config.indicators;
        let toggles = &self.config.toggles;
        let closes = &primary.closes;
        let mut snapshot = IndicatorSnapshot::default();

        if toggles.use_rsi {
            snapshot.rsi = rsi::calculate(closes, params.rsi_period).latest;
        }
        if toggles.use_macd {
            if let Some(value) =
                macd::calculate(closes, params.macd_fast, params.macd_slow, params.macd_signal).latest
            {
                snapshot.macd = Some(value.macd);
                snapshot.macd_signal = Some(value.signal);
                snapshot.macd_histogram = Some(value.histogram);
            }
        }
        if toggles.use_ema {
            snapshot.ema5 = ema::calculate(closes, params.ema_fast).latest;
            snapshot.ema20 = ema::calculate(closes, params.ema_medium).latest;
            snapshot.ema60 = ema::calculate(closes, params.ema_slow).latest;
        }
        if toggles.use_boll {
            if let Some(value) = bollinger::calculate(closes, params.bb_period, params.bb_std_dev).latest
            {
                snapshot.bb_upper = Some(value.upper);
                snapshot.bb_middle = Some(value.middle);
                snapshot.bb_lower = Some(value.lower);
                snapshot.bb_percent_b = Some(value.percent_b);
            }
        }
        if toggles.use_kdj {
            if let Some(value) = kdj::calculate(
                &primary.highs,
                &primary.lows,
                closes,
                params.kdj_period,
                params.kdj_smooth,
            )
            .latest
            {
                snapshot.kdj_k = Some(value.k);
                snapshot.kdj_d = Some(value.d);
                snapshot.kdj_j = Some(value.j);
            }
        }
        if toggles.use_atr {
            snapshot.atr =
                atr::calculate(&primary.highs, &primary.lows, closes, params.atr_period).latest;
        }
        if toggles.use_cci {
            snapshot.cci =
                cci::calculate(&primary.highs, &primary.lows, closes, params.cci_period).latest;
        }
        if toggles.use_vwap {
            snapshot.vwap =
                vwap::calculate(&primary.highs, &primary.lows, closes, &primary.volumes).latest;
        }
        if toggles.use_volume {
            snapshot.volume_ratio = volume::calculate(&primary.volumes, params.volume_ma_period)
                .latest_ratio;
        }
        if toggles.use_adx {
            let result = adx::calculate(&primary.highs, &primary.lows, closes, params.adx_period);
            snapshot.adx = result.latest_adx;
            snapshot.plus_di = result.latest_plus_di;
            snapshot.minus_di = result.latest_minus_di;
        }

        snapshot
    }

    /// Grade is a pure step function of adjusted strength.
    fn grade(&self, adjusted_strength: f64) -> SignalGrade {
        let g = &self.config.grades;
        if adjusted_strength >= g.strong {
            SignalGrade::A
        } else if adjusted_strength >= g.standard {
            SignalGrade::B
        } else if adjusted_strength >= g.weak {
            SignalGrade::C
        } else {
            SignalGrade::None
        }
    }

    fn predictions(
        &self,
        direction: SignalDirection,
        strength: f64,
        current_price: f64,
        atr: Option<f64>,
    ) -> Vec<Prediction> {
        if direction == SignalDirection::Hold {
            return Vec::new();
        }

        self.config
            .prediction_horizons
            .iter()
            .map(|&horizon| {
                let time_decay = 1.0 - (horizon as f64 / 120.0) * 0.3;
                let target_price = atr.map(|atr| {
                    let distance = atr * horizon as f64 / 30.0;
                    if direction == SignalDirection::Buy {
                        current_price + distance
                    } else {
                        current_price - distance
                    }
                });
                Prediction {
                    horizon_minutes: horizon,
                    direction,
                    confidence: strength * time_decay,
                    target_price,
                }
            })
            .collect()
    }

    fn warnings(
        &self,
        state: &MarketStateResult,
        mtf: Option<&MtfResult>,
        grade: SignalGrade,
    ) -> Vec<String> {
        let mut warnings = Vec::new();

        if state.confidence < 0.6 {
            warnings.push(format!(
                "market state unclear (confidence {:.0}%)",
                state.confidence * 100.0
            ));
        }
        if let Some(mtf) = mtf {
            if !mtf.is_confirmed {
                warnings.push(format!(
                    "multi-timeframe confirmation failed ({} confirmed)",
                    mtf.confirmation_count
                ));
            }
            if mtf.rejection_count > 0 {
                warnings.push(format!(
                    "{} timeframe(s) rejected the signal",
                    mtf.rejection_count
                ));
            }
        }
        match grade {
            SignalGrade::C => warnings.push("weak signal, caution advised".to_string()),
            SignalGrade::None => warnings.push("strength below entry grade".to_string()),
            _ => {}
        }
        if matches!(state.state, MarketState::BreakoutUp | MarketState::BreakoutDown)
            && !state.volume_spike
        {
            warnings.push("breakout without volume spike".to_string());
        }

        warnings
    }

    #[allow(clippy::too_many_arguments)]
    fn no_signal(
        &self,
        id: String,
        now: DateTime<Utc>,
        reason: &str,
        state: MarketState,
        state_result: Option<&MarketStateResult>,
        strategy_used: &str,
        indicator_values: IndicatorSnapshot,
    ) -> TradingSignal {
        let warnings = state_result
            .filter(|r| r.confidence < 0.6)
            .map(|r| {
                vec![format!(
                    "market state unclear (confidence {:.0}%)",
                    r.confidence * 100.0
                )]
            })
            .unwrap_or_default();

        TradingSignal {
            id,
            timestamp: now,
            symbol: self.symbol.clone(),
            direction: SignalDirection::Hold,
            strength: 0.0,
            adjusted_strength: 0.0,
            grade: SignalGrade::None,
            market_state: state,
            strategy_used: strategy_used.to_string(),
            is_confirmed: false,
            confirmation_count: 0,
            timeframe_confirmations: HashMap::new(),
            entry_price: 0.0,
            stop_loss: None,
            take_profit: None,
            predictions: Vec::new(),
            reasons: vec![reason.to_string()],
            warnings,
            indicator_values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        breakout_series, default_test_config, oversold_range_series, price_arrays,
    };

    fn generator() -> SignalGenerator {
        SignalGenerator::new(&default_test_config())
    }

    #[test]
    fn grade_mapping_is_monotone() {
        let g = generator();
        assert_eq!(g.grade(0.9), SignalGrade::A);
        assert_eq!(g.grade(0.75), SignalGrade::A);
        assert_eq!(g.grade(0.6), SignalGrade::B);
        assert_eq!(g.grade(0.5), SignalGrade::B);
        assert_eq!(g.grade(0.4), SignalGrade::C);
        assert_eq!(g.grade(0.3), SignalGrade::C);
        assert_eq!(g.grade(0.1), SignalGrade::None);
    }

    #[test]
    fn prediction_confidence_decays_with_horizon() {
        let g = generator();
        let predictions = g.predictions(SignalDirection::Buy, 0.8, 100.0, Some(2.0));
        assert_eq!(predictions.len(), 3);
        assert!(predictions[0].confidence > predictions[1].confidence);
        assert!(predictions[1].confidence > predictions[2].confidence);
        // 10m: 0.8 * (1 - 10/120 * 0.3) = 0.78
        assert!((predictions[0].confidence - 0.78).abs() < 1e-9);
        // Target scales with horizon: 2.0 * h / 30.
        assert!((predictions[0].target_price.unwrap() - (100.0 + 2.0 / 3.0)).abs() < 1e-9);
        assert!((predictions[2].target_price.unwrap() - 104.0).abs() < 1e-9);
    }

    #[test]
    fn predictions_without_atr_have_no_target() {
        let g = generator();
        let predictions = g.predictions(SignalDirection::Sell, 0.5, 100.0, None);
        assert!(predictions.iter().all(|p| p.target_price.is_none()));
        assert!(predictions.iter().all(|p| p.direction == SignalDirection::Sell));
    }

    #[test]
    fn short_history_emits_hold_with_reason() {
        let mut g = generator();
        let arrays = price_arrays(&vec![(100.0, 101.0, 99.0, 100.5, 10.0); 20]);
        let signal = g.generate(&arrays, &HashMap::new(), Utc::now());
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert_eq!(signal.market_state, MarketState::Unknown);
        assert_eq!(signal.reasons, vec!["not enough history".to_string()]);
    }

    #[test]
    fn ranging_market_produces_graded_buy() {
        let mut g = generator();
        let (highs, lows, closes, volumes) = oversold_range_series();
        let arrays = PriceArrays {
            opens: closes.clone(),
            highs,
            lows,
            closes,
            volumes,
        };
        let signal = g.generate(&arrays, &HashMap::new(), Utc::now());
        assert_eq!(signal.direction, SignalDirection::Buy, "reasons: {:?}", signal.reasons);
        assert_eq!(signal.strategy_used, "ranging");
        assert_eq!(signal.market_state, MarketState::Ranging);
        assert!(signal.strength >= 0.7, "strength {}", signal.strength);
        assert!(matches!(signal.grade, SignalGrade::A | SignalGrade::B));
        // Snapshot carries the dashboard pack even for strategy fields.
        assert!(signal.indicator_values.rsi.is_some());
        assert!(signal.indicator_values.adx.is_some());
    }

    #[test]
    fn breakout_without_volume_carries_warning() {
        let mut g = generator();
        let (highs, lows, closes, volumes) = breakout_series(false);
        let arrays = PriceArrays {
            opens: closes.clone(),
            highs,
            lows,
            closes,
            volumes,
        };
        let signal = g.generate(&arrays, &HashMap::new(), Utc::now());
        if signal.direction != SignalDirection::Hold {
            assert!(
                signal.warnings.iter().any(|w| w.contains("breakout without volume spike"))
                    || signal.reasons.iter().any(|r| r.contains("without volume spike")),
                "warnings: {:?} reasons: {:?}",
                signal.warnings,
                signal.reasons
            );
        }
    }

    #[test]
    fn ids_are_unique_and_sequential() {
        let mut g = generator();
        let arrays = price_arrays(&vec![(100.0, 101.0, 99.0, 100.5, 10.0); 20]);
        let a = g.generate(&arrays, &HashMap::new(), Utc::now());
        let b = g.generate(&arrays, &HashMap::new(), Utc::now());
        assert_ne!(a.id, b.id);
        assert_eq!(a.id, "SIG-000001");
        assert_eq!(b.id, "SIG-000002");
    }
}
