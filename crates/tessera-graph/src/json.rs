use std::collections::BTreeMap;

use serde_json::Value;

/// Encode a value as canonical JSON: object keys sorted lexicographically at
/// every level, so the same logical value always serializes to the same
/// bytes regardless of insertion order upstream. Used for output persistence
/// (§4.2 step 5) so that round-tripping a value through storage is stable.
pub fn canonical_json(value: &Value) -> String {
  serde_json::to_string(&sort_keys(value)).expect("canonical JSON values are always serializable")
}

fn sort_keys(value: &Value) -> Value {
  match value {
    Value::Object(map) => {
      let sorted: BTreeMap<String, Value> =
        map.iter().map(|(k, v)| (k.clone(), sort_keys(v))).collect();
      serde_json::to_value(sorted).expect("BTreeMap<String, Value> always serializes")
    }
    Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
    other => other.clone(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn key_order_does_not_affect_output() {
    let a = json!({"b": 1, "a": 2});
    let b = json!({"a": 2, "b": 1});
    assert_eq!(canonical_json(&a), canonical_json(&b));
  }

  #[test]
  fn nested_objects_are_sorted_too() {
    let v = json!({"z": {"y": 1, "x": 2}});
    assert_eq!(canonical_json(&v), r#"{"z":{"x":2,"y":1}}"#);
  }
}
