//! Auto-Repair
//!
//! Fixes the soft parts of a candidate (confidence map, rationale, tags,
//! strategy name, unreadable order type, RR band) when its price levels and
//! RR are present JSON numbers. The result must still pass both phases.

use serde_json::{json, Map, Value};

use super::config::ValidatorConfig;
use super::schema::{has_numeric_levels, RISK_REWARD_KEYS};
use crate::domain::{OrderType, CONFIDENCE_KEYS, DEFAULT_CONFIDENCE};
use crate::templates::StrategyTemplate;

/// Repaired candidate and what was changed
#[derive(Debug, Clone, PartialEq)]
pub struct Repair {
    pub value: Value,
    pub notes: Vec<String>,
}

/// Attempt a repair; `None` when the candidate is not repairable
pub fn repair_candidate(
    value: &Value,
    template: Option<&StrategyTemplate>,
    config: &ValidatorConfig,
) -> Option<Repair> {
    if !has_numeric_levels(value) {
        return None;
    }
    let mut obj = value.as_object()?.clone();
    let mut notes = Vec::new();

    repair_confidence(&mut obj, &mut notes);

    let rationale_ok = obj
        .get("rationale")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !rationale_ok {
        obj.insert("rationale".to_string(), json!("no rationale provided"));
        notes.push("defaulted rationale".to_string());
    }

    match obj.get("tags") {
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
        Some(Value::Array(items)) => {
            let kept: Vec<Value> = items.iter().filter(|t| t.is_string()).cloned().collect();
            obj.insert("tags".to_string(), Value::Array(kept));
            notes.push("dropped non-string tags".to_string());
        }
        _ => {
            obj.insert("tags".to_string(), json!([]));
            notes.push("defaulted tags".to_string());
        }
    }

    let strategy_ok = obj
        .get("strategy")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !strategy_ok {
        if let Some(t) = template {
            obj.insert("strategy".to_string(), json!(t.strategy));
            notes.push(format!("strategy taken from template {}", t.id));
        }
    }

    let order_type_ok = obj
        .get("order_type")
        .and_then(Value::as_str)
        .is_some_and(|s| s.parse::<OrderType>().is_ok());
    if !order_type_ok {
        obj.insert("order_type".to_string(), json!(OrderType::Skip.as_str()));
        notes.push("unreadable order_type replaced with skip".to_string());
    }

    if let Some(key) = RISK_REWARD_KEYS.iter().find(|k| obj.contains_key(**k)) {
        if let Some(rr) = obj.get(*key).and_then(Value::as_f64) {
            let clamped = rr.clamp(config.repair_rr_min, config.repair_rr_max);
            if clamped != rr {
                obj.insert(key.to_string(), json!(clamped));
                notes.push(format!("risk_reward {} clamped to {}", rr, clamped));
            }
        }
    }

    Some(Repair {
        value: Value::Object(obj),
        notes,
    })
}

fn repair_confidence(obj: &mut Map<String, Value>, notes: &mut Vec<String>) {
    let mut scores = Map::new();
    let mut changed = false;

    match obj.get("confidence") {
        Some(Value::Object(existing)) => {
            for (key, v) in existing {
                let score = match v.as_f64() {
                    Some(s) if s.is_finite() => {
                        let clamped = s.clamp(0.0, 100.0);
                        changed |= clamped != s;
                        clamped
                    }
                    _ => {
                        changed = true;
                        DEFAULT_CONFIDENCE
                    }
                };
                scores.insert(key.clone(), json!(score));
            }
        }
        _ => changed = true,
    }

    for key in CONFIDENCE_KEYS {
        if !scores.contains_key(key) {
            scores.insert(key.to_string(), json!(DEFAULT_CONFIDENCE));
            changed = true;
        }
    }

    if changed {
        obj.insert("confidence".to_string(), Value::Object(scores));
        notes.push("confidence map defaulted/clamped".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels_only() -> Value {
        json!({
            "order_type": "buy_stop",
            "entry": 102.5,
            "stop": 100.0,
            "target": 107.5,
            "risk_reward": 7.5,
            "confidence": {"overall": 130, "structure": "high"}
        })
    }

    #[test]
    fn test_repairs_soft_fields() {
        let template = crate::templates::builtin_templates().remove(0);
        let repair = repair_candidate(&levels_only(), Some(&template), &ValidatorConfig::default()).unwrap();
        let v = &repair.value;
        assert_eq!(v["strategy"], json!("trend_pullback"));
        assert_eq!(v["risk_reward"], json!(5.0));
        assert_eq!(v["confidence"]["overall"], json!(100.0));
        assert_eq!(v["confidence"]["structure"], json!(50.0));
        assert_eq!(v["confidence"]["execution"], json!(50.0));
        assert_eq!(v["tags"], json!([]));
        assert!(v["rationale"].is_string());
        assert_eq!(repair.notes.len(), 5, "{:?}", repair.notes);
    }

    #[test]
    fn test_not_repairable_without_numeric_levels() {
        let mut value = levels_only();
        value["target"] = json!("107.5");
        assert!(repair_candidate(&value, None, &ValidatorConfig::default()).is_none());
    }

    #[test]
    fn test_unreadable_order_type_becomes_skip() {
        let mut value = levels_only();
        value["order_type"] = json!("market");
        let repair = repair_candidate(&value, None, &ValidatorConfig::default()).unwrap();
        assert_eq!(repair.value["order_type"], json!("skip"));
    }

    #[test]
    fn test_disallowed_but_readable_order_type_kept() {
        let mut value = levels_only();
        value["order_type"] = json!("sell_limit");
        let repair = repair_candidate(&value, None, &ValidatorConfig::default()).unwrap();
        assert_eq!(repair.value["order_type"], json!("sell_limit"));
    }
}
