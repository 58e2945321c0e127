//! Built-in Templates
//!
//! Used when no catalog file is configured or the file fails to load.
//! A catalog file is merged on top of these.

use crate::domain::{MarketRegime, OrderType};

use super::template::{StrategyTemplate, TemplateRules};

const TREND_PULLBACK_BODY: &str = r#"You are planning a trend-pullback entry on {{SYMBOL}} during the {{SESSION}} session.
The market regime is {{REGIME}}.

Features:
{{FEATURES_JSON}}

Rules:
- Trade only in the direction of the higher-timeframe trend, using buy_stop / sell_stop orders.
- The stop goes beyond the pullback swing, no closer than 0.4 ATR to entry.
- Only propose trades with RR ≥ 1.8; otherwise answer with order_type "skip".

Reply with JSON: strategy, order_type, entry, stop, target, risk_reward,
confidence {overall, regime_fit, structure, execution}, rationale, tags."#;

const RANGE_FADE_BODY: &str = r#"You are planning a range-fade entry on {{SYMBOL}} during the {{SESSION}} session.
The market regime is {{REGIME}}.

Features:
{{FEATURES_JSON}}

Rules:
- Fade the range extremes with buy_limit / sell_limit orders; never enter from mid-range.
- The stop sits outside the range boundary, no closer than 0.4 ATR to entry.
- Only propose trades with RR ≥ 1.5; otherwise answer with order_type "skip".

Reply with JSON: strategy, order_type, entry, stop, target, risk_reward,
confidence {overall, regime_fit, structure, execution}, rationale, tags."#;

const BREAKOUT_BODY: &str = r#"You are planning a volatility breakout on {{SYMBOL}} during the {{SESSION}} session.
The market regime is {{REGIME}}.

Features:
{{FEATURES_JSON}}

Rules:
- Enter beyond the consolidation with buy_stop / sell_stop orders, confirmed by volume.
- The stop goes back inside the consolidation, no closer than 0.4 ATR to entry.
- Only propose trades with RR ≥ 2.0; otherwise answer with order_type "skip".

Reply with JSON: strategy, order_type, entry, stop, target, risk_reward,
confidence {overall, regime_fit, structure, execution}, rationale, tags."#;

/// Built-in template set, one version per strategy
pub fn builtin_templates() -> Vec<StrategyTemplate> {
    vec![
        StrategyTemplate {
            id: "trend_pullback_v1".to_string(),
            version: "1.0".to_string(),
            strategy: "trend_pullback".to_string(),
            regime: MarketRegime::Trend,
            order_types: vec![OrderType::BuyStop, OrderType::SellStop],
            min_rr: 1.8,
            max_rr: 4.0,
            body: TREND_PULLBACK_BODY.to_string(),
            rules: TemplateRules {
                min_trend_agreement: Some(0.6),
                ..Default::default()
            },
        },
        StrategyTemplate {
            id: "range_fade_v1".to_string(),
            version: "1.0".to_string(),
            strategy: "range_fade".to_string(),
            regime: MarketRegime::Range,
            order_types: vec![OrderType::BuyLimit, OrderType::SellLimit],
            min_rr: 1.5,
            max_rr: 3.0,
            body: RANGE_FADE_BODY.to_string(),
            rules: TemplateRules {
                max_adx: Some(25.0),
                ..Default::default()
            },
        },
        StrategyTemplate {
            id: "breakout_v1".to_string(),
            version: "1.0".to_string(),
            strategy: "breakout".to_string(),
            regime: MarketRegime::Volatile,
            order_types: vec![OrderType::BuyStop, OrderType::SellStop],
            min_rr: 2.0,
            max_rr: 5.0,
            body: BREAKOUT_BODY.to_string(),
            rules: TemplateRules {
                min_adx: Some(20.0),
                ..Default::default()
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateHealthChecker;

    #[test]
    fn test_builtins_are_healthy() {
        let checker = TemplateHealthChecker::new();
        for template in builtin_templates() {
            let report = checker.check(&template);
            assert!(report.is_healthy(), "{}: {:?}", template.id, report.issues);
        }
    }

    #[test]
    fn test_one_builtin_per_tradable_regime() {
        let templates = builtin_templates();
        for regime in [MarketRegime::Trend, MarketRegime::Range, MarketRegime::Volatile] {
            assert_eq!(templates.iter().filter(|t| t.regime == regime).count(), 1);
        }
    }
}
