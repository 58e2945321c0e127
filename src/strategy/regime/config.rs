//! Regime Classifier Thresholds
//!
//! Every knob the classifier uses. Resolved per symbol/session from the
//! strategy map's `regime` section on top of these defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default ADX value mapped to a fully normalized 1.0
pub const DEFAULT_ADX_CAP: f64 = 50.0;

/// Default ADX at or above which a timeframe counts as trending
pub const DEFAULT_TREND_GATE: f64 = 35.0;

/// Default M15 ADX below which the market reads as ranging
pub const DEFAULT_RANGE_LOW: f64 = 25.0;

/// Default band width at or below which the market is squeezed
pub const DEFAULT_SQUEEZE_WIDTH: f64 = 0.012;

/// Default band width at or above which volatility is expanding
pub const DEFAULT_WIDE_WIDTH: f64 = 0.020;

/// Default minimum winning score for a confident label
pub const DEFAULT_CONFIDENT_GATE: f64 = 0.48;

/// Blend weights for the per-timeframe ADX
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdxWeights {
    pub m5: f64,
    pub m15: f64,
    pub h1: f64,
}

impl Default for AdxWeights {
    fn default() -> Self {
        Self {
            m5: 0.20,
            m15: 0.50,
            h1: 0.30,
        }
    }
}

/// Additive per-session score nudges
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionNudge {
    pub trend: f64,
    pub range: f64,
    pub volatile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub adx_cap: f64,
    pub adx_weights: AdxWeights,
    pub trend_gate: f64,
    /// Subtracted from the trend score when 1 or 2 timeframes are above the gate
    pub conflict_penalty: f64,
    pub range_low: f64,
    pub squeeze_width: f64,
    pub wide_width: f64,
    /// Mid-ADX band rewarded by the volatile score
    pub mid_adx_low: f64,
    pub mid_adx_high: f64,
    /// Added to the volatile score on timeframe disagreement
    pub disagreement_bonus: f64,
    /// Alignment weight when no EMA200 is available
    pub ema_fallback_weight: f64,
    /// Keyed by session name (ASIA, LONDON, NY)
    pub session_nudges: BTreeMap<String, SessionNudge>,
    pub news_window_minutes: f64,
    pub news_volatility_bump: f64,
    /// Weight of the fresh scores when smoothing against previous scores
    pub smoothing_alpha: f64,
    pub hysteresis_bonus: f64,
    pub confident_gate: f64,
    /// Fallback RANGE needs M15 ADX this far below `range_low`
    pub fallback_range_margin: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        let mut session_nudges = BTreeMap::new();
        let major = SessionNudge {
            trend: 0.05,
            range: 0.0,
            volatile: 0.03,
        };
        session_nudges.insert("LONDON".to_string(), major);
        session_nudges.insert("NY".to_string(), major);
        session_nudges.insert(
            "ASIA".to_string(),
            SessionNudge {
                trend: 0.0,
                range: 0.05,
                volatile: 0.0,
            },
        );

        Self {
            adx_cap: DEFAULT_ADX_CAP,
            adx_weights: AdxWeights::default(),
            trend_gate: DEFAULT_TREND_GATE,
            conflict_penalty: 0.30,
            range_low: DEFAULT_RANGE_LOW,
            squeeze_width: DEFAULT_SQUEEZE_WIDTH,
            wide_width: DEFAULT_WIDE_WIDTH,
            mid_adx_low: 20.0,
            mid_adx_high: 30.0,
            disagreement_bonus: 0.20,
            ema_fallback_weight: 0.70,
            session_nudges,
            news_window_minutes: 30.0,
            news_volatility_bump: 0.05,
            smoothing_alpha: 0.30,
            hysteresis_bonus: 0.05,
            confident_gate: DEFAULT_CONFIDENT_GATE,
            fallback_range_margin: 7.0,
        }
    }
}

impl RegimeConfig {
    /// Config with no session nudges, mostly for deterministic tests
    pub fn without_nudges() -> Self {
        Self {
            session_nudges: BTreeMap::new(),
            ..Default::default()
        }
    }

    pub fn nudge_for(&self, session: &str) -> SessionNudge {
        self.session_nudges.get(session).copied().unwrap_or_default()
    }
}
