//! Layered Configuration Merge
//!
//! Configuration is resolved from ordered JSON layers:
//! `defaults <- global strategy map <- per-symbol profile <- per-session override`.
//! Later layers win key by key; nested objects merge recursively, anything
//! else is replaced wholesale. `null` in a layer means "not set here".

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Overlay `layer` onto `base` in place
pub fn overlay(base: &mut Value, layer: &Value) {
    match (base, layer) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                if value.is_null() {
                    continue;
                }
                let merge_nested =
                    value.is_object() && base_map.get(key).is_some_and(Value::is_object);
                if merge_nested {
                    if let Some(existing) = base_map.get_mut(key) {
                        overlay(existing, value);
                    }
                } else {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        (base, layer) => *base = layer.clone(),
    }
}

/// Merge layers left to right into a fresh value
pub fn merge_layers(layers: &[&Value]) -> Value {
    let mut merged = Value::Object(Default::default());
    for layer in layers {
        overlay(&mut merged, layer);
    }
    merged
}

/// Resolve a typed config: `T::default()` first, then each layer on top
pub fn resolve_layers<T>(layers: &[&Value]) -> Result<T, serde_json::Error>
where
    T: Default + Serialize + DeserializeOwned,
{
    let defaults = serde_json::to_value(T::default())?;
    let mut all: Vec<&Value> = Vec::with_capacity(layers.len() + 1);
    all.push(&defaults);
    all.extend_from_slice(layers);
    serde_json::from_value(merge_layers(&all))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Thresholds {
        gate: f64,
        cap: f64,
        nested: Nested,
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Nested {
        a: f64,
        b: f64,
    }

    #[test]
    fn test_later_layer_wins_per_key() {
        let base = json!({"gate": 35.0, "cap": 50.0});
        let symbol = json!({"gate": 30.0});
        let merged = merge_layers(&[&base, &symbol]);
        assert_eq!(merged, json!({"gate": 30.0, "cap": 50.0}));
    }

    #[test]
    fn test_nested_objects_deep_merge() {
        let base = json!({"nudges": {"LONDON": {"trend": 0.05, "volatile": 0.03}}});
        let session = json!({"nudges": {"LONDON": {"trend": 0.08}}});
        let merged = merge_layers(&[&base, &session]);
        assert_eq!(merged["nudges"]["LONDON"]["trend"], json!(0.08));
        assert_eq!(merged["nudges"]["LONDON"]["volatile"], json!(0.03));
    }

    #[test]
    fn test_null_and_missing_layers_ignored() {
        let base = json!({"gate": 35.0});
        let merged = merge_layers(&[&base, &Value::Null, &json!({"gate": null})]);
        assert_eq!(merged, json!({"gate": 35.0}));
    }

    #[test]
    fn test_arrays_replace_not_merge() {
        let base = json!({"list": [1, 2, 3]});
        let merged = merge_layers(&[&base, &json!({"list": [9]})]);
        assert_eq!(merged["list"], json!([9]));
    }

    #[test]
    fn test_resolve_layers_typed() {
        let global = json!({"gate": 35.0, "nested": {"a": 1.0}});
        let session = json!({"nested": {"b": 2.0}});
        let resolved: Thresholds = resolve_layers(&[&global, &session]).unwrap();
        assert_eq!(
            resolved,
            Thresholds {
                gate: 35.0,
                cap: 0.0,
                nested: Nested { a: 1.0, b: 2.0 },
            }
        );
    }

    #[test]
    fn test_resolve_layers_type_error() {
        let bad = json!({"gate": "high"});
        let resolved: Result<Thresholds, _> = resolve_layers(&[&bad]);
        assert!(resolved.is_err());
    }
}
