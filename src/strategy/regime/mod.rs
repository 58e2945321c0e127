//! Market Regime Classification Module
//!
//! Labels the market TREND / RANGE / VOLATILE (or UNKNOWN on missing data)
//! from multi-timeframe ADX, band width and direction features.
//!
//! - **RegimeClassifier**: stateless scorer, previous label/scores passed in
//! - **RegimeConfig**: thresholds resolved from the strategy map's `regime` section

pub mod classifier;
pub mod config;

pub use classifier::{RegimeClassification, RegimeClassifier, RegimeInput};
pub use config::{AdxWeights, RegimeConfig, SessionNudge};
