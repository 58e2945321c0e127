//! Schema Phase
//!
//! Structural checks on the raw candidate JSON. Prices and RR must be JSON
//! numbers; only `skip` candidates may omit them.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::config::ValidatorConfig;
use crate::domain::{OrderType, TradeCandidate};

/// Accepted keys for the reported risk:reward
pub const RISK_REWARD_KEYS: &[&str] = &["risk_reward", "rr", "risk_reward_ratio"];

const LEVEL_KEYS: [&str; 3] = ["entry", "stop", "target"];

/// Schema findings plus the typed candidate when the structure is sound
#[derive(Debug, Clone, Default)]
pub struct SchemaReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub candidate: Option<TradeCandidate>,
}

pub fn risk_reward_field(obj: &Map<String, Value>) -> Option<&Value> {
    RISK_REWARD_KEYS.iter().find_map(|k| obj.get(*k))
}

/// Entry, stop, target and RR are all present JSON numbers
pub fn has_numeric_levels(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    LEVEL_KEYS
        .iter()
        .all(|k| obj.get(*k).is_some_and(Value::is_number))
        && risk_reward_field(obj).is_some_and(Value::is_number)
}

fn numeric_field(
    name: &str,
    value: Option<&Value>,
    required: bool,
    errors: &mut Vec<String>,
) -> Option<f64> {
    match value {
        None | Some(Value::Null) => {
            if required {
                errors.push(format!("missing {}", name));
            }
            None
        }
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() => Some(n),
            _ => {
                errors.push(format!("{} must be a number", name));
                None
            }
        },
    }
}

/// Run the schema checks
pub fn check_schema(value: &Value, config: &ValidatorConfig) -> SchemaReport {
    let mut report = SchemaReport::default();
    let Some(obj) = value.as_object() else {
        report.errors.push("candidate is not a JSON object".to_string());
        return report;
    };
    let errors = &mut report.errors;

    let strategy = match obj.get("strategy").and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(_) | None => {
            errors.push("missing strategy".to_string());
            None
        }
    };

    let order_type = match obj.get("order_type") {
        Some(Value::String(raw)) => match raw.parse::<OrderType>() {
            Ok(ot) => Some(ot),
            Err(_) => {
                errors.push(format!("invalid order_type '{}'", raw));
                None
            }
        },
        Some(_) => {
            errors.push("order_type must be a string".to_string());
            None
        }
        None => {
            errors.push("missing order_type".to_string());
            None
        }
    };

    // levels may be omitted only when the candidate declines to trade
    let levels_required = !order_type.is_some_and(|ot| ot.is_skip());
    let entry = numeric_field("entry", obj.get("entry"), levels_required, errors);
    let stop = numeric_field("stop", obj.get("stop"), levels_required, errors);
    let target = numeric_field("target", obj.get("target"), levels_required, errors);
    let risk_reward = numeric_field("risk_reward", risk_reward_field(obj), levels_required, errors);

    if let Some(rr) = risk_reward {
        if rr <= 0.0 || rr > config.max_schema_rr {
            errors.push(format!(
                "risk_reward {:.2} outside (0, {}]",
                rr, config.max_schema_rr
            ));
        }
    }

    let mut confidence = BTreeMap::new();
    match obj.get("confidence") {
        Some(Value::Object(map)) => {
            for (key, v) in map {
                match v.as_f64() {
                    Some(score) if (0.0..=100.0).contains(&score) => {
                        confidence.insert(key.clone(), score);
                    }
                    Some(score) => errors.push(format!(
                        "confidence.{} = {} outside [0, 100]",
                        key, score
                    )),
                    None => errors.push(format!("confidence.{} must be a number", key)),
                }
            }
        }
        Some(_) => errors.push("confidence must be an object".to_string()),
        None => errors.push("missing confidence".to_string()),
    }

    let rationale = match obj.get("rationale") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            errors.push("rationale must be a string".to_string());
            String::new()
        }
        None => {
            errors.push("missing rationale".to_string());
            String::new()
        }
    };

    let tags = match obj.get("tags") {
        Some(Value::Array(items)) => {
            let tags: Vec<String> = items
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
            if tags.len() != items.len() {
                report
                    .warnings
                    .push("non-string tags ignored".to_string());
            }
            tags
        }
        Some(_) => {
            report.errors.push("tags must be an array".to_string());
            Vec::new()
        }
        None => {
            report.errors.push("missing tags".to_string());
            Vec::new()
        }
    };

    if report.errors.is_empty() {
        if let (Some(strategy), Some(order_type)) = (strategy, order_type) {
            report.candidate = Some(TradeCandidate {
                strategy,
                order_type,
                entry,
                stop,
                target,
                risk_reward,
                confidence,
                rationale,
                tags,
                template_version: obj
                    .get("template_version")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full() -> Value {
        json!({
            "strategy": "trend_pullback",
            "order_type": "buy_stop",
            "entry": 102.5,
            "stop": 100.0,
            "target": 107.5,
            "risk_reward": 2.0,
            "confidence": {"overall": 70, "regime_fit": 65, "structure": 72, "execution": 68},
            "rationale": "pullback to EMA",
            "tags": ["trend"]
        })
    }

    #[test]
    fn test_complete_candidate_parses() {
        let report = check_schema(&full(), &ValidatorConfig::default());
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let c = report.candidate.unwrap();
        assert_eq!(c.order_type, OrderType::BuyStop);
        assert_eq!(c.risk_reward, Some(2.0));
        assert!(c.has_complete_confidence());
    }

    #[test]
    fn test_skip_may_omit_levels() {
        let value = json!({
            "strategy": "breakout",
            "order_type": "hold",
            "confidence": {},
            "rationale": "no setup",
            "tags": []
        });
        let report = check_schema(&value, &ValidatorConfig::default());
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.candidate.unwrap().order_type, OrderType::Skip);
    }

    #[test]
    fn test_string_prices_rejected() {
        let mut value = full();
        value["entry"] = json!("102.5");
        let report = check_schema(&value, &ValidatorConfig::default());
        assert_eq!(report.errors, vec!["entry must be a number".to_string()]);
        assert!(report.candidate.is_none());
        assert!(!has_numeric_levels(&value));
    }

    #[test]
    fn test_rr_and_confidence_bounds() {
        let mut value = full();
        value["risk_reward"] = json!(12.0);
        value["confidence"]["overall"] = json!(140);
        let report = check_schema(&value, &ValidatorConfig::default());
        assert_eq!(report.errors.len(), 2, "{:?}", report.errors);
    }

    #[test]
    fn test_missing_everything() {
        let report = check_schema(&json!({}), &ValidatorConfig::default());
        // strategy, order_type, 4 numbers, confidence, rationale, tags
        assert_eq!(report.errors.len(), 9, "{:?}", report.errors);
        assert!(check_schema(&json!([1]), &ValidatorConfig::default()).errors[0].contains("not a JSON object"));
    }

    #[test]
    fn test_rr_alias() {
        let mut value = full();
        let obj = value.as_object_mut().unwrap();
        obj.remove("risk_reward");
        obj.insert("rr".to_string(), json!(2.0));
        assert!(has_numeric_levels(&value));
        assert!(check_schema(&value, &ValidatorConfig::default()).errors.is_empty());
    }
}
