use serde::{Deserialize, Serialize};

/// Latest value of every dashboard indicator, one optional field per series.
/// `None` means the series is still warming up. This replaces ad-hoc
/// name-to-value maps in the hot path; strategies overlay their own fields on
/// top of the generator's base pack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub ema5: Option<f64>,
    pub ema20: Option<f64>,
    pub ema60: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_percent_b: Option<f64>,
    pub kdj_k: Option<f64>,
    pub kdj_d: Option<f64>,
    pub kdj_j: Option<f64>,
    pub atr: Option<f64>,
    pub cci: Option<f64>,
    pub vwap: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub market_state_confidence: Option<f64>,
}

impl IndicatorSnapshot {
    /// Overlay: fields the other snapshot has filled win.
    pub fn merged_with(&self, overlay: &IndicatorSnapshot) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: overlay.rsi.or(self.rsi),
            macd: overlay.macd.or(self.macd),
            macd_signal: overlay.macd_signal.or(self.macd_signal),
            macd_histogram: overlay.macd_histogram.or(self.macd_histogram),
            ema5: overlay.ema5.or(self.ema5),
            ema20: overlay.ema20.or(self.ema20),
            ema60: overlay.ema60.or(self.ema60),
            bb_upper: overlay.bb_upper.or(self.bb_upper),
            bb_middle: overlay.bb_middle.or(self.bb_middle),
            bb_lower: overlay.bb_lower.or(self.bb_lower),
            bb_percent_b: overlay.bb_percent_b.or(self.bb_percent_b),
            kdj_k: overlay.kdj_k.or(self.kdj_k),
            kdj_d: overlay.kdj_d.or(self.kdj_d),
            kdj_j: overlay.kdj_j.or(self.kdj_j),
            atr: overlay.atr.or(self.atr),
            cci: overlay.cci.or(self.cci),
            vwap: overlay.vwap.or(self.vwap),
            volume_ratio: overlay.volume_ratio.or(self.volume_ratio),
            adx: overlay.adx.or(self.adx),
            plus_di: overlay.plus_di.or(self.plus_di),
            minus_di: overlay.minus_di.or(self.minus_di),
            market_state_confidence: overlay
                .market_state_confidence
                .or(self.market_state_confidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_wins_only_where_set() {
        let base = IndicatorSnapshot {
            rsi: Some(55.0),
            atr: Some(1.5),
            ..Default::default()
        };
        let overlay = IndicatorSnapshot {
            rsi: Some(60.0),
            ema20: Some(101.0),
            ..Default::default()
        };
        let merged = base.merged_with(&overlay);
        assert_eq!(merged.rsi, Some(60.0));
        assert_eq!(merged.atr, Some(1.5));
        assert_eq!(merged.ema20, Some(101.0));
        assert!(merged.macd.is_none());
    }
}
