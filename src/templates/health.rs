//! Template Health Checks
//!
//! A small rule table; each rule is a plain function returning the
//! diagnostics it found so it can be tested on its own.

use regex::Regex;

use super::template::{
    StrategyTemplate, FEATURES_PLACEHOLDER, REGIME_PLACEHOLDER, SESSION_PLACEHOLDER,
    SYMBOL_PLACEHOLDER,
};

/// Placeholder tokens and whether the body must contain them
pub const PLACEHOLDER_RULES: &[(&str, bool)] = &[
    (FEATURES_PLACEHOLDER, true),
    (SYMBOL_PLACEHOLDER, false),
    (SESSION_PLACEHOLDER, false),
    (REGIME_PLACEHOLDER, false),
];

/// Allowed gap between the body's stated minimum RR and `min_rr`
pub const RR_ASSERTION_TOLERANCE: f64 = 0.05;

/// Matches "RR ≥ 2", "RR >= 2.5", "R:R at least 1.8"
const RR_COMPARISON_PATTERN: &str =
    r"(?i)\b(?:RR|R:R|risk[\s:/-]*reward)\s*(?:≥|>=|=>|of at least|at least|min(?:imum)?)\s*(\d+(?:\.\d+)?)";

/// Matches "at least 2.5x" / "at least 2.5×"
const RR_MULTIPLE_PATTERN: &str = r"(?i)at least\s*(\d+(?:\.\d+)?)\s*(?:x|×)";

type RuleFn = fn(&TemplateHealthChecker, &StrategyTemplate) -> Vec<String>;

/// One named health rule
pub struct HealthRule {
    pub name: &'static str,
    pub check: RuleFn,
}

/// Rule table, run in order
pub const HEALTH_RULES: &[HealthRule] = &[
    HealthRule { name: "identity", check: check_identity },
    HealthRule { name: "order_types", check: check_order_types },
    HealthRule { name: "rr_bounds", check: check_rr_bounds },
    HealthRule { name: "placeholders", check: check_placeholders },
    HealthRule { name: "rr_assertion", check: check_rr_assertion },
];

/// Result of a health check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthReport {
    pub template_id: String,
    pub issues: Vec<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn check_identity(_: &TemplateHealthChecker, t: &StrategyTemplate) -> Vec<String> {
    let mut issues = Vec::new();
    for (field, value) in [("id", &t.id), ("strategy", &t.strategy), ("body", &t.body)] {
        if value.trim().is_empty() {
            issues.push(format!("template {} is empty", field));
        }
    }
    issues
}

pub fn check_order_types(_: &TemplateHealthChecker, t: &StrategyTemplate) -> Vec<String> {
    if t.order_types.is_empty() {
        vec!["template allows no order types".to_string()]
    } else {
        Vec::new()
    }
}

pub fn check_rr_bounds(_: &TemplateHealthChecker, t: &StrategyTemplate) -> Vec<String> {
    if t.min_rr > 0.0 && t.min_rr < t.max_rr {
        Vec::new()
    } else {
        vec![format!(
            "invalid RR bounds: need 0 < min_rr < max_rr, got {} / {}",
            t.min_rr, t.max_rr
        )]
    }
}

pub fn check_placeholders(_: &TemplateHealthChecker, t: &StrategyTemplate) -> Vec<String> {
    PLACEHOLDER_RULES
        .iter()
        .filter(|(token, required)| *required && !t.body.contains(token))
        .map(|(token, _)| format!("body missing required placeholder {}", token))
        .collect()
}

pub fn check_rr_assertion(checker: &TemplateHealthChecker, t: &StrategyTemplate) -> Vec<String> {
    let stated = checker.stated_min_rr(&t.body);
    if stated.is_empty() {
        return vec!["body does not state its minimum RR".to_string()];
    }
    if stated
        .iter()
        .any(|rr| (rr - t.min_rr).abs() <= RR_ASSERTION_TOLERANCE)
    {
        Vec::new()
    } else {
        vec![format!(
            "body states minimum RR {} but min_rr is {}",
            stated
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("/"),
            t.min_rr
        )]
    }
}

/// Runs [`HEALTH_RULES`] with its compiled patterns
#[derive(Debug, Clone)]
pub struct TemplateHealthChecker {
    rr_patterns: Vec<Regex>,
}

impl Default for TemplateHealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateHealthChecker {
    pub fn new() -> Self {
        let rr_patterns = [RR_COMPARISON_PATTERN, RR_MULTIPLE_PATTERN]
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::error!("Invalid RR assertion pattern {}: {}", p, e);
                    None
                }
            })
            .collect();
        Self { rr_patterns }
    }

    /// Minimum RR values the body asserts, in order of appearance per pattern
    pub fn stated_min_rr(&self, body: &str) -> Vec<f64> {
        self.rr_patterns
            .iter()
            .flat_map(|re| re.captures_iter(body))
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| m.as_str().parse::<f64>().ok())
            .collect()
    }

    pub fn check(&self, template: &StrategyTemplate) -> HealthReport {
        let issues = HEALTH_RULES
            .iter()
            .flat_map(|rule| (rule.check)(self, template))
            .collect();
        HealthReport {
            template_id: template.id.clone(),
            issues,
        }
    }

    /// Run a single rule by name; `None` when no such rule exists
    pub fn run_rule(&self, name: &str, template: &StrategyTemplate) -> Option<Vec<String>> {
        HEALTH_RULES
            .iter()
            .find(|r| r.name == name)
            .map(|r| (r.check)(self, template))
    }
}
