//! Decision Outcome
//!
//! The single externally visible result of one pipeline invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candidate::TradeCandidate;
use super::regime::{MarketRegime, RegimeScores};
use super::session::SessionContext;

/// Accept or skip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Ok,
    Skip,
}

/// Final decision, annotated for journaling and dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub status: DecisionStatus,
    pub symbol: String,
    /// Validated (possibly repaired and confidence-adjusted) candidate
    pub candidate: Option<TradeCandidate>,
    /// Why the invocation skipped, in the order the reasons were produced
    pub skip_reasons: Vec<String>,
    pub template_id: Option<String>,
    pub template_version: Option<String>,
    pub regime: MarketRegime,
    pub regime_scores: RegimeScores,
    pub session: SessionContext,
    pub validation_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub session_tag: String,
    pub tags: Vec<String>,
}

impl DecisionOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == DecisionStatus::Ok
    }

    pub fn is_skip(&self) -> bool {
        self.status == DecisionStatus::Skip
    }

    /// Any skip reason containing `needle` (case-insensitive)
    pub fn has_reason(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.skip_reasons
            .iter()
            .any(|r| r.to_ascii_lowercase().contains(&needle))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
