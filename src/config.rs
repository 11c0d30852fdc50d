use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::Timeframe;

pub type SharedConfig = Arc<RwLock<Config>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorToggles {
    pub use_macd: bool,
    pub use_rsi: bool,
    pub use_kdj: bool,
    pub use_boll: bool,
    pub use_ema: bool,
    pub use_cci: bool,
    pub use_atr: bool,
    pub use_vwap: bool,
    pub use_volume: bool,
    pub use_adx: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub kdj_period: usize,
    pub kdj_smooth: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr_period: usize,
    pub adx_period: usize,
    pub cci_period: usize,
    pub ema_fast: usize,
    pub ema_medium: usize,
    pub ema_slow: usize,
    pub volume_ma_period: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStateThresholds {
    pub adx_ranging: f64,
    pub adx_trending: f64,
    pub adx_strong_trend: f64,
    pub volume_spike_for_breakout: f64,
    pub atr_spike_for_breakout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangingParams {
    pub enabled: bool,
    pub bb_lower_threshold: f64,
    pub bb_upper_threshold: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub kdj_oversold: f64,
    pub kdj_overbought: f64,
    pub j_extreme_low: f64,
    pub j_extreme_high: f64,
    pub min_strength: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingParams {
    pub enabled: bool,
    pub ema_pullback_threshold: f64,
    pub rsi_healthy_low: f64,
    pub rsi_healthy_high: f64,
    pub macd_confirmation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakoutParams {
    pub enabled: bool,
    pub lookback_period: usize,
    pub min_breakout_atr: f64,
    pub volume_confirmation: bool,
    pub min_volume_ratio: f64,
    pub atr_expansion_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtfConfig {
    pub enabled: bool,
    pub confirmation_timeframes: Vec<Timeframe>,
    pub min_confirmations: usize,
    /// Weight per timeframe, primary included. Must sum to 1 ± 0.01.
    pub weights: HashMap<Timeframe, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeThresholds {
    pub strong: f64,
    pub standard: f64,
    pub weak: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Market
    pub symbol: String,
    pub primary_interval: Timeframe,
    pub contract_type: String,
    pub history: usize,
    pub buffer_size: usize,

    // Transport
    pub api_url: String,
    pub ws_url: String,
    pub use_proxy: bool,
    pub proxy_url: String,
    pub ws_idle_timeout_secs: u64,
    pub ws_ping_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: usize,

    // Strategy surface
    pub toggles: IndicatorToggles,
    pub indicators: IndicatorParams,
    pub market_state: MarketStateThresholds,
    pub ranging: RangingParams,
    pub trending: TrendingParams,
    pub breakout: BreakoutParams,
    pub mtf: MtfConfig,
    pub grades: GradeThresholds,
    pub prediction_horizons: Vec<u16>,

    // Resonance surface (recognized knobs, bounds-checked)
    pub min_resonance: Option<usize>,
    pub min_score: f64,

    // Tracking / output
    pub verification_pending_cap: usize,
    pub signal_log_path: String,
    pub log_interval_secs: u64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        let env_f64 = |key: &str, default: f64| -> f64 {
            std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
        };
        let env_usize = |key: &str, default: usize| -> usize {
            std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
        };
        let env_bool = |key: &str, default: bool| -> bool {
            std::env::var(key)
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(default)
        };

        let mut weights = HashMap::new();
        weights.insert(Timeframe::M5, 0.40);
        weights.insert(Timeframe::M15, 0.35);
        weights.insert(Timeframe::H1, 0.25);

        Config {
            symbol: env("SYMBOL", "BTCUSDT"),
            primary_interval: Timeframe::M5,
            contract_type: env("CONTRACT_TYPE", "perpetual"),
            history: env_usize("HISTORY", 200),
            buffer_size: env_usize("BUFFER_SIZE", 500),

            api_url: env("BINANCE_API_URL", "https://fapi.binance.com"),
            ws_url: env("BINANCE_WS_URL", "wss://fstream.binance.com"),
            use_proxy: env_bool("USE_PROXY", false),
            proxy_url: env("PROXY_URL", ""),
            ws_idle_timeout_secs: env_usize("WS_IDLE_TIMEOUT", 60) as u64,
            ws_ping_timeout_secs: env_usize("WS_PING_TIMEOUT", 10) as u64,
            request_timeout_secs: env_usize("REQUEST_TIMEOUT", 30) as u64,
            max_retries: env_usize("MAX_RETRIES", 10),

            toggles: IndicatorToggles {
                use_macd: env_bool("USE_MACD", true),
                use_rsi: env_bool("USE_RSI", true),
                use_kdj: env_bool("USE_KDJ", true),
                use_boll: env_bool("USE_BOLL", true),
                use_ema: env_bool("USE_EMA", true),
                use_cci: env_bool("USE_CCI", false),
                use_atr: env_bool("USE_ATR", true),
                use_vwap: env_bool("USE_VWAP", false),
                use_volume: env_bool("USE_VOLUME", true),
                use_adx: env_bool("USE_ADX", true),
            },
            indicators: IndicatorParams {
                rsi_period: env_usize("RSI_PERIOD", 14),
                rsi_overbought: env_f64("RSI_OVERBOUGHT", 70.0),
                rsi_oversold: env_f64("RSI_OVERSOLD", 30.0),
                macd_fast: env_usize("MACD_FAST", 12),
                macd_slow: env_usize("MACD_SLOW", 26),
                macd_signal: env_usize("MACD_SIGNAL", 9),
                kdj_period: env_usize("KDJ_PERIOD", 9),
                kdj_smooth: env_usize("KDJ_SMOOTH", 3),
                bb_period: env_usize("BB_PERIOD", 20),
                bb_std_dev: env_f64("BB_STD_DEV", 2.0),
                atr_period: env_usize("ATR_PERIOD", 14),
                adx_period: env_usize("ADX_PERIOD", 14),
                cci_period: env_usize("CCI_PERIOD", 20),
                ema_fast: env_usize("EMA_FAST", 5),
                ema_medium: env_usize("EMA_MEDIUM", 20),
                ema_slow: env_usize("EMA_SLOW", 60),
                volume_ma_period: env_usize("VOLUME_MA_PERIOD", 20),
            },
            market_state: MarketStateThresholds {
                adx_ranging: env_f64("ADX_RANGING_THRESHOLD", 20.0),
                adx_trending: env_f64("ADX_TRENDING_THRESHOLD", 25.0),
                adx_strong_trend: env_f64("ADX_STRONG_TREND_THRESHOLD", 40.0),
                volume_spike_for_breakout: env_f64("VOLUME_SPIKE_FOR_BREAKOUT", 1.5),
                atr_spike_for_breakout: env_f64("ATR_SPIKE_FOR_BREAKOUT", 1.3),
            },
            ranging: RangingParams {
                enabled: env_bool("RANGING_ENABLED", true),
                bb_lower_threshold: 0.15,
                bb_upper_threshold: 0.85,
                rsi_oversold: 35.0,
                rsi_overbought: 65.0,
                kdj_oversold: 25.0,
                kdj_overbought: 75.0,
                j_extreme_low: 10.0,
                j_extreme_high: 90.0,
                min_strength: 0.3,
            },
            trending: TrendingParams {
                enabled: env_bool("TRENDING_ENABLED", true),
                ema_pullback_threshold: env_f64("EMA_PULLBACK_THRESHOLD", 0.015),
                rsi_healthy_low: 40.0,
                rsi_healthy_high: 70.0,
                macd_confirmation: true,
            },
            breakout: BreakoutParams {
                enabled: env_bool("BREAKOUT_ENABLED", true),
                lookback_period: env_usize("BREAKOUT_LOOKBACK", 20),
                min_breakout_atr: env_f64("MIN_BREAKOUT_ATR", 0.5),
                volume_confirmation: true,
                min_volume_ratio: env_f64("MIN_VOLUME_RATIO", 1.5),
                atr_expansion_threshold: 1.2,
            },
            mtf: MtfConfig {
                enabled: env_bool("MTF_ENABLED", true),
                confirmation_timeframes: vec![Timeframe::M15, Timeframe::H1],
                min_confirmations: env_usize("MIN_CONFIRMATIONS", 1),
                weights,
            },
            grades: GradeThresholds {
                strong: env_f64("GRADE_A_THRESHOLD", 0.75),
                standard: env_f64("GRADE_B_THRESHOLD", 0.50),
                weak: env_f64("GRADE_C_THRESHOLD", 0.30),
            },
            prediction_horizons: vec![10, 30, 60],

            min_resonance: std::env::var("MIN_RESONANCE")
                .ok()
                .filter(|s| s != "auto")
                .and_then(|s| s.parse().ok()),
            min_score: env_f64("MIN_SCORE", 70.0),

            verification_pending_cap: env_usize("VERIFICATION_PENDING_CAP", 50),
            signal_log_path: env("SIGNAL_LOG_PATH", "logs/signals.log"),
            log_interval_secs: env_usize("LOG_INTERVAL", 5) as u64,
            log_level: env("LOG_LEVEL", "info"),
        }
    }

    /// `min_resonance = auto` resolves to 70% of the enabled indicators,
    /// never below 2.
    pub fn effective_min_resonance(&self) -> usize {
        if let Some(n) = self.min_resonance {
            return n;
        }
        let t = &self.toggles;
        let enabled = [
            t.use_macd, t.use_rsi, t.use_kdj, t.use_boll, t.use_ema, t.use_cci, t.use_atr,
            t.use_vwap, t.use_volume,
        ]
        .iter()
        .filter(|&&b| b)
        .count();
        ((enabled as f64 * 0.7).ceil() as usize).max(2)
    }

    /// Fatal configuration errors, checked once at startup.
    pub fn validate(&self) -> Result<()> {
        if !self.toggles.use_adx {
            bail!("ADX must stay enabled; the market-state classifier depends on it");
        }
        if !(self.ranging.enabled || self.trending.enabled || self.breakout.enabled) {
            bail!("at least one strategy must be enabled");
        }
        if self.prediction_horizons.is_empty() {
            bail!("prediction_horizons must not be empty");
        }
        if !(0.0..=100.0).contains(&self.min_score) {
            bail!("min_score must be within [0, 100], got {}", self.min_score);
        }
        if self.grades.strong <= self.grades.standard || self.grades.standard <= self.grades.weak {
            bail!(
                "grade thresholds must be strictly ordered: A ({}) > B ({}) > C ({})",
                self.grades.strong,
                self.grades.standard,
                self.grades.weak
            );
        }
        if self.market_state.adx_ranging > self.market_state.adx_trending
            || self.market_state.adx_trending > self.market_state.adx_strong_trend
        {
            bail!("market-state ADX thresholds must be ordered ranging <= trending <= strong");
        }
        if self.mtf.enabled {
            if self.mtf.confirmation_timeframes.is_empty() {
                bail!("multi-timeframe confirmation enabled but no confirmation timeframes set");
            }
            let mut total: f64 = self
                .mtf
                .weights
                .get(&self.primary_interval)
                .copied()
                .unwrap_or(0.0);
            for tf in &self.mtf.confirmation_timeframes {
                total += self.mtf.weights.get(tf).copied().unwrap_or(0.0);
            }
            if (total - 1.0).abs() > 0.01 {
                bail!("multi-timeframe weights must sum to 1.0 (+/- 0.01), got {total:.3}");
            }
        }
        Ok(())
    }

    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::default_test_config;

    #[test]
    fn default_config_is_valid() {
        let cfg = default_test_config();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bad_weights_are_fatal() {
        let mut cfg = default_test_config();
        cfg.mtf.weights.insert(Timeframe::H1, 0.9);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unordered_grades_are_fatal() {
        let mut cfg = default_test_config();
        cfg.grades.standard = 0.8;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn disabling_adx_is_fatal() {
        let mut cfg = default_test_config();
        cfg.toggles.use_adx = false;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn auto_min_resonance() {
        let mut cfg = default_test_config();
        cfg.min_resonance = None;
        // Defaults enable macd, rsi, kdj, boll, ema, atr, volume = 7 of 9.
        assert_eq!(cfg.effective_min_resonance(), 5);
        cfg.min_resonance = Some(3);
        assert_eq!(cfg.effective_min_resonance(), 3);
    }
}
