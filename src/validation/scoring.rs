//! Advisory quality score for a validated candidate (0-100)

use super::config::ValidatorConfig;
use crate::domain::{FeatureSnapshot, TradeCandidate};

const ERROR_PENALTY: f64 = 20.0;
const WARNING_PENALTY: f64 = 5.0;

pub fn quality_score(
    candidate: Option<&TradeCandidate>,
    features: &FeatureSnapshot,
    error_count: usize,
    warning_count: usize,
    config: &ValidatorConfig,
) -> f64 {
    let mut score = 100.0 - ERROR_PENALTY * error_count as f64 - WARNING_PENALTY * warning_count as f64;

    if let Some(c) = candidate {
        if c.has_complete_confidence() {
            score += 5.0;
        }

        if let Some(rr) = c.computed_risk_reward().or(c.risk_reward) {
            if (config.rr_sweet_spot_low..=config.rr_sweet_spot_high).contains(&rr) {
                score += 5.0;
            }
            if rr > 5.0 {
                score -= 10.0;
            }
            if rr < 1.2 {
                score -= 10.0;
            }
        }

        let atr = features.primary().atr();
        if let (Some(distance), true) = (c.stop_distance(), atr > 0.0) {
            let multiple = distance / atr;
            if multiple >= config.solid_stop_atr {
                score += 5.0;
            } else if multiple >= config.min_stop_atr {
                score -= 5.0;
            }
        }
    }

    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderType, Timeframe, CONFIDENCE_KEYS};
    use std::collections::BTreeMap;

    fn candidate(stop: f64) -> TradeCandidate {
        TradeCandidate {
            strategy: "trend_pullback".to_string(),
            order_type: OrderType::BuyStop,
            entry: Some(102.5),
            stop: Some(stop),
            target: Some(107.5),
            risk_reward: Some(2.0),
            confidence: CONFIDENCE_KEYS.iter().map(|k| (k.to_string(), 60.0)).collect::<BTreeMap<_, _>>(),
            rationale: String::new(),
            tags: vec![],
            template_version: None,
        }
    }

    #[test]
    fn test_clean_candidate_scores_full() {
        let features = FeatureSnapshot::new("X", 102.0).with_value(Timeframe::M15, "atr", 5.0);
        // 100 + 5 confidence + 5 RR 2.0 + 5 stop 0.5 ATR, clamped
        let score = quality_score(Some(&candidate(100.0)), &features, 0, 0, &ValidatorConfig::default());
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_penalties() {
        let features = FeatureSnapshot::new("X", 102.0).with_value(Timeframe::M15, "atr", 5.0);
        // stop 2.25 away = 0.45 ATR, RR = 5 / 2.25 = 2.22
        let score = quality_score(Some(&candidate(100.25)), &features, 1, 2, &ValidatorConfig::default());
        // 100 - 20 - 10 + 5 + 5 - 5
        assert_eq!(score, 75.0);
    }

    #[test]
    fn test_floor_at_zero() {
        let features = FeatureSnapshot::new("X", 1.0);
        assert_eq!(quality_score(None, &features, 7, 0, &ValidatorConfig::default()), 0.0);
    }
}
