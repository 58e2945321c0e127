//! Strategy Layer - Regime, Session and Session-Rule Logic
//!
//! The pure decision stages of the pipeline:
//! - `regime`: multi-timeframe TREND / RANGE / VOLATILE classification
//! - `session`: session, overlap and transition detection from a UTC timestamp
//! - `session_profiles`: per-session thresholds with overlap/transition overlays
//! - `session_rules`: session filters and confidence adjustment

pub mod regime;
pub mod session;
pub mod session_profiles;
pub mod session_rules;

pub use regime::{RegimeClassification, RegimeClassifier, RegimeConfig, RegimeInput};
pub use session::{detect_session, detect_session_opt, detect_session_str, session_duration};
pub use session_profiles::{resolve_profile, SessionProfile};
pub use session_rules::{ConfidenceAdjustment, FilterResult, SessionRulesEngine};
