//! Validator Thresholds
//!
//! Resolved per symbol/session from the strategy map's `validation` section.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default minimum stop distance in ATR multiples (inclusive)
pub const DEFAULT_MIN_STOP_ATR: f64 = 0.4;

/// Default share of planned RR that execution costs may consume
pub const DEFAULT_MAX_COST_EROSION: f64 = 0.20;

/// Default upper bound for a schema-valid RR
pub const DEFAULT_MAX_SCHEMA_RR: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub max_schema_rr: f64,
    pub min_stop_atr: f64,
    /// Stop distance (ATR multiples) that earns the scoring bonus
    pub solid_stop_atr: f64,
    /// Clearance beyond supplied swing levels, in ATR multiples
    pub swing_buffer_atr: f64,
    pub max_cost_erosion: f64,
    pub trend_min_agreement: f64,
    pub range_max_adx: f64,
    pub breakout_min_adx: f64,
    /// Range-fade minimum band width keyed by session
    pub range_min_bb_width: BTreeMap<String, f64>,
    pub mid_range_low: f64,
    pub mid_range_high: f64,
    pub asia_breakout_volume_z: f64,
    pub asia_trend_volume_z: f64,
    /// RR band that earns the scoring bonus
    pub rr_sweet_spot_low: f64,
    pub rr_sweet_spot_high: f64,
    /// Repair clamps the reported RR into this band
    pub repair_rr_min: f64,
    pub repair_rr_max: f64,
    /// Relative reported-vs-recomputed RR gap that raises a warning
    pub rr_mismatch_warning: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        let mut range_min_bb_width = BTreeMap::new();
        range_min_bb_width.insert("ASIA".to_string(), 0.02);
        range_min_bb_width.insert("LONDON".to_string(), 0.03);
        range_min_bb_width.insert("NY".to_string(), 0.03);

        Self {
            max_schema_rr: DEFAULT_MAX_SCHEMA_RR,
            min_stop_atr: DEFAULT_MIN_STOP_ATR,
            solid_stop_atr: 0.5,
            swing_buffer_atr: 0.1,
            max_cost_erosion: DEFAULT_MAX_COST_EROSION,
            trend_min_agreement: 0.6,
            range_max_adx: 25.0,
            breakout_min_adx: 20.0,
            range_min_bb_width,
            mid_range_low: 0.35,
            mid_range_high: 0.65,
            asia_breakout_volume_z: 2.0,
            asia_trend_volume_z: 1.8,
            rr_sweet_spot_low: 1.8,
            rr_sweet_spot_high: 3.5,
            repair_rr_min: 1.0,
            repair_rr_max: 5.0,
            rr_mismatch_warning: 0.15,
        }
    }
}

impl ValidatorConfig {
    pub fn range_min_bb_width_for(&self, session: &str) -> Option<f64> {
        self.range_min_bb_width.get(session).copied()
    }
}
