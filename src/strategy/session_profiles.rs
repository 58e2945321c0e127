//! Session Profiles
//!
//! Per-session filter thresholds and confidence deltas. A profile resolves
//! from a base session profile plus overlap and transition overlays, each
//! built-in layer followed by the strategy map's `session_profiles` override
//! for the same key.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::config::{resolve_layers, StrategyMap};
use crate::domain::{SessionContext, TradingSession};

/// Overlay key applied during the first/last minutes of a session
pub const TRANSITION_KEY: &str = "TRANSITION";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionProfile {
    pub preferred_strategies: Vec<String>,
    pub discouraged_strategies: Vec<String>,
    /// Minimum M15 ADX for trend/breakout strategies
    pub min_adx: f64,
    pub min_volume_z: f64,
    pub min_bb_width: f64,
    /// Spread ceiling as % of ATR
    pub max_spread_atr_pct: f64,
    pub avoid_first_minutes: u32,
    pub avoid_last_minutes: u32,
    /// 0 disables the last-minutes check
    pub session_duration_minutes: u32,
    pub base_confidence_delta: f64,
    pub strategy_deltas: BTreeMap<String, f64>,
    pub symbol_multipliers: BTreeMap<String, f64>,
    pub require_bos_for_trend: bool,
    pub require_volume_for_breakout: bool,
    pub volume_confirmation_z: f64,
    /// Block trend entries from the middle of the range
    pub discourage_mid_range: bool,
    pub mid_range_low: f64,
    pub mid_range_high: f64,
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self {
            preferred_strategies: Vec::new(),
            discouraged_strategies: Vec::new(),
            min_adx: 0.0,
            min_volume_z: -10.0,
            min_bb_width: 0.0,
            max_spread_atr_pct: 100.0,
            avoid_first_minutes: 0,
            avoid_last_minutes: 0,
            session_duration_minutes: 0,
            base_confidence_delta: 0.0,
            strategy_deltas: BTreeMap::new(),
            symbol_multipliers: BTreeMap::new(),
            require_bos_for_trend: false,
            require_volume_for_breakout: false,
            volume_confirmation_z: 1.0,
            discourage_mid_range: false,
            mid_range_low: 0.35,
            mid_range_high: 0.65,
        }
    }
}

impl SessionProfile {
    pub fn is_discouraged(&self, strategy: &str) -> bool {
        self.discouraged_strategies
            .iter()
            .any(|s| s.eq_ignore_ascii_case(strategy))
    }

    pub fn strategy_delta(&self, strategy: &str) -> f64 {
        self.strategy_deltas.get(strategy).copied().unwrap_or(0.0)
    }

    pub fn symbol_multiplier(&self, symbol: &str) -> f64 {
        self.symbol_multipliers
            .get(&symbol.to_ascii_uppercase())
            .copied()
            .unwrap_or(1.0)
    }
}

/// Built-in base profile for a session
pub fn builtin_profile(session: TradingSession) -> Value {
    match session {
        TradingSession::London => json!({
            "preferred_strategies": ["trend_pullback", "breakout"],
            "discouraged_strategies": [],
            "min_adx": 18.0,
            "min_volume_z": -1.0,
            "min_bb_width": 0.006,
            "max_spread_atr_pct": 25.0,
            "avoid_first_minutes": 15,
            "avoid_last_minutes": 30,
            "session_duration_minutes": 480,
            "base_confidence_delta": 5.0,
            "strategy_deltas": {"trend_pullback": 5.0, "breakout": 3.0, "range_fade": -5.0},
            "symbol_multipliers": {"GBPUSD": 1.1, "EURGBP": 1.1, "EURUSD": 1.0},
            "require_bos_for_trend": true,
            "require_volume_for_breakout": true,
            "volume_confirmation_z": 1.0,
            "discourage_mid_range": true
        }),
        TradingSession::NewYork => json!({
            "preferred_strategies": ["trend_pullback", "breakout"],
            "discouraged_strategies": [],
            "min_adx": 20.0,
            "min_volume_z": -1.0,
            "min_bb_width": 0.006,
            "max_spread_atr_pct": 30.0,
            "avoid_first_minutes": 15,
            "avoid_last_minutes": 30,
            "session_duration_minutes": 480,
            "base_confidence_delta": 3.0,
            "strategy_deltas": {"trend_pullback": 3.0, "breakout": 5.0, "range_fade": -5.0},
            "symbol_multipliers": {"USDJPY": 1.05, "XAUUSD": 1.1, "US30": 1.1},
            "require_bos_for_trend": true,
            "require_volume_for_breakout": true,
            "volume_confirmation_z": 1.2,
            "discourage_mid_range": true
        }),
        TradingSession::Asia => json!({
            "preferred_strategies": ["range_fade"],
            "discouraged_strategies": ["breakout", "trend_pullback"],
            "min_adx": 15.0,
            "min_volume_z": -1.5,
            "min_bb_width": 0.004,
            "max_spread_atr_pct": 35.0,
            "avoid_first_minutes": 30,
            "avoid_last_minutes": 30,
            "session_duration_minutes": 600,
            "base_confidence_delta": -5.0,
            "strategy_deltas": {"range_fade": 5.0, "trend_pullback": -5.0, "breakout": -10.0},
            "symbol_multipliers": {"USDJPY": 1.1, "AUDUSD": 1.1, "NZDUSD": 1.05},
            "require_bos_for_trend": true,
            "require_volume_for_breakout": true,
            "volume_confirmation_z": 2.0,
            "discourage_mid_range": false
        }),
        TradingSession::Unknown => json!({
            "min_adx": 25.0,
            "min_volume_z": 0.0,
            "max_spread_atr_pct": 20.0,
            "base_confidence_delta": -10.0,
            "require_bos_for_trend": true,
            "require_volume_for_breakout": true,
            "volume_confirmation_z": 1.5,
            "discourage_mid_range": true
        }),
    }
}

/// Built-in overlay for an overlap or transition key
pub fn builtin_overlay(key: &str) -> Option<Value> {
    match key {
        "LONDON_NY" => Some(json!({
            "min_adx": 16.0,
            "max_spread_atr_pct": 30.0,
            "base_confidence_delta": 8.0
        })),
        "ASIA_LONDON" => Some(json!({
            "max_spread_atr_pct": 25.0,
            "base_confidence_delta": -3.0
        })),
        "NY_ASIA" => Some(json!({
            "min_volume_z": 0.0,
            "max_spread_atr_pct": 20.0,
            "base_confidence_delta": -8.0
        })),
        TRANSITION_KEY => Some(json!({
            "base_confidence_delta": -5.0
        })),
        _ => None,
    }
}

/// Resolve the effective profile for a session context.
///
/// Layer order: base, overlap overlay, transition overlay; each built-in
/// layer is followed by its strategy map override.
pub fn resolve_profile(ctx: &SessionContext, map: &StrategyMap) -> SessionProfile {
    let base_key = ctx.session.as_str();
    let base = builtin_profile(ctx.session);

    let mut keyed: Vec<(&str, Option<Value>)> = vec![(base_key, Some(base))];
    if let Some(overlap) = ctx.overlap {
        keyed.push((overlap.as_str(), builtin_overlay(overlap.as_str())));
    }
    if ctx.is_transition_period {
        keyed.push((TRANSITION_KEY, builtin_overlay(TRANSITION_KEY)));
    }

    let mut layers: Vec<&Value> = Vec::new();
    for (key, builtin) in &keyed {
        if let Some(b) = builtin {
            layers.push(b);
        }
        if let Some(o) = map.profile_override(key) {
            layers.push(o);
        }
    }

    match resolve_layers::<SessionProfile>(&layers) {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(
                "Session profile for {} is malformed ({}), using built-in profile",
                ctx.tag(),
                e
            );
            serde_json::from_value(builtin_profile(ctx.session)).unwrap_or_default()
        }
    }
}
