//! Response Validation
//!
//! Validates a raw candidate in two phases (schema, then business rules),
//! attempts an auto-repair when the original fails, and scores the result.
//!
//! - `schema`: structural checks on the JSON candidate
//! - `rules`: template, geometry, cost, guardrail and session rules
//! - `repair`: soft-field repair, re-validated in full before acceptance
//! - `scoring`: advisory 0-100 quality score

pub mod config;
pub mod repair;
pub mod rules;
pub mod schema;
pub mod scoring;

pub use config::ValidatorConfig;
pub use repair::{repair_candidate, Repair};
pub use rules::{check_business, RuleContext, RuleFindings};
pub use schema::{check_schema, SchemaReport};
pub use scoring::quality_score;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{FeatureSnapshot, SessionContext, TradeCandidate};
use crate::templates::StrategyTemplate;

/// Result of validating one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Typed candidate (the repaired one when `repaired` is set)
    pub candidate: Option<TradeCandidate>,
    pub repaired: bool,
    /// What the repair changed
    pub repairs: Vec<String>,
    pub score: f64,
}

/// Two-phase validator with auto-repair
#[derive(Debug, Clone, Default)]
pub struct ResponseValidator {
    config: ValidatorConfig,
}

struct PhaseResult {
    errors: Vec<String>,
    warnings: Vec<String>,
    candidate: Option<TradeCandidate>,
}

impl ResponseValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    fn run_phases(
        &self,
        value: &Value,
        template: Option<&StrategyTemplate>,
        features: &FeatureSnapshot,
        session: &SessionContext,
    ) -> PhaseResult {
        let schema = check_schema(value, &self.config);
        let mut errors = schema.errors;
        let mut warnings = schema.warnings;

        let Some(template) = template else {
            errors.push("no template supplied: business rules cannot run".to_string());
            return PhaseResult {
                errors,
                warnings,
                candidate: schema.candidate,
            };
        };

        if let Some(candidate) = &schema.candidate {
            let findings = check_business(
                candidate,
                &RuleContext {
                    template,
                    features,
                    session,
                    config: &self.config,
                },
            );
            errors.extend(findings.errors);
            warnings.extend(findings.warnings);
        }

        PhaseResult {
            errors,
            warnings,
            candidate: schema.candidate,
        }
    }

    /// Validate, repairing when possible
    pub fn validate(
        &self,
        value: &Value,
        template: Option<&StrategyTemplate>,
        features: &FeatureSnapshot,
        session: &SessionContext,
    ) -> ValidationOutcome {
        let original = self.run_phases(value, template, features, session);
        if original.errors.is_empty() {
            return self.outcome(original, features, false, Vec::new());
        }

        if let Some(repair) = repair_candidate(value, template, &self.config) {
            let repaired = self.run_phases(&repair.value, template, features, session);
            if repaired.errors.is_empty() && repaired.candidate.is_some() {
                tracing::info!("Candidate auto-repaired: {}", repair.notes.join("; "));
                return self.outcome(repaired, features, true, repair.notes);
            }
            tracing::debug!(
                "Repair attempt still invalid ({} errors), keeping original errors",
                repaired.errors.len()
            );
        }

        self.outcome(original, features, false, Vec::new())
    }

    fn outcome(
        &self,
        phase: PhaseResult,
        features: &FeatureSnapshot,
        repaired: bool,
        repairs: Vec<String>,
    ) -> ValidationOutcome {
        let score = quality_score(
            phase.candidate.as_ref(),
            features,
            phase.errors.len(),
            phase.warnings.len(),
            &self.config,
        );
        let valid = phase.errors.is_empty() && phase.candidate.is_some();
        ValidationOutcome {
            valid,
            errors: phase.errors,
            warnings: phase.warnings,
            candidate: phase.candidate,
            repaired,
            repairs,
            score,
        }
    }
}
