//! Strategy Template
//!
//! A versioned instruction body plus the rule bag the validator enforces
//! for candidates produced from it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::{FeatureSnapshot, MarketRegime, OrderType, SessionContext};

/// Placeholder replaced by the feature snapshot JSON
pub const FEATURES_PLACEHOLDER: &str = "{{FEATURES_JSON}}";
pub const SYMBOL_PLACEHOLDER: &str = "{{SYMBOL}}";
pub const SESSION_PLACEHOLDER: &str = "{{SESSION}}";
pub const REGIME_PLACEHOLDER: &str = "{{REGIME}}";

/// Per-template validation rules; unset fields fall back to validator defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateRules {
    pub min_adx: Option<f64>,
    pub max_adx: Option<f64>,
    pub min_trend_agreement: Option<f64>,
    /// Feature flags that must be true on the primary frame
    pub required_confirmations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyTemplate {
    pub id: String,
    pub version: String,
    pub strategy: String,
    pub regime: MarketRegime,
    pub order_types: Vec<OrderType>,
    pub min_rr: f64,
    pub max_rr: f64,
    pub body: String,
    #[serde(default)]
    pub rules: TemplateRules,
}

impl StrategyTemplate {
    /// Order type permitted by this template; `skip` always is
    pub fn allows(&self, order_type: OrderType) -> bool {
        order_type.is_skip() || self.order_types.contains(&order_type)
    }

    /// Fill the body's placeholders for one invocation
    pub fn render(&self, features: &FeatureSnapshot, ctx: &SessionContext, regime: MarketRegime) -> String {
        self.body
            .replace(FEATURES_PLACEHOLDER, &features.to_json())
            .replace(SYMBOL_PLACEHOLDER, &features.symbol)
            .replace(SESSION_PLACEHOLDER, &ctx.tag())
            .replace(REGIME_PLACEHOLDER, regime.as_str())
    }
}

/// Compare dotted versions numerically ("1.10" > "1.9"), falling back to text order
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Option<Vec<u64>> {
        v.trim_start_matches(['v', 'V'])
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect()
    };
    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
