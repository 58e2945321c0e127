//! Domain Layer - Core types for the regime gate
//!
//! Pure data types with no I/O. Everything the pipeline stages exchange
//! lives here:
//! - `regime`: regime labels and score triples
//! - `session`: trading sessions, overlaps and the derived context
//! - `features`: lenient, alias-aware access to indicator snapshots
//! - `candidate`: trade proposals, order types and strategy families
//! - `decision`: the final accept/skip outcome

pub mod regime;
pub mod session;
pub mod features;
pub mod candidate;
pub mod decision;

pub use regime::{MarketRegime, RegimeScores};
pub use session::{OverlapType, SessionContext, TradingSession};
pub use features::{
    CrossTimeframeSummary, FeatureSnapshot, FrameView, Guardrails, Indicator, Timeframe,
    PRIMARY_TIMEFRAME,
};
pub use candidate::{
    Direction, OrderType, StrategyFamily, TradeCandidate, CONFIDENCE_KEYS, DEFAULT_CONFIDENCE,
};
pub use decision::{DecisionOutcome, DecisionStatus};
