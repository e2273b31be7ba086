//! Validation of generated payloads
//!
//! - JSON repair for malformed completions
//! - Locating the record list inside loosely shaped batch payloads

mod json_repair;

pub use json_repair::{JsonRepairer, extract_json_from_response};

use serde_json::Value;

/// Find the list of records in a batch payload.
///
/// Accepted shapes, in order:
/// 1. a bare array
/// 2. an object with a key containing `hint` (keys trimmed of quotes/whitespace)
/// 3. the first array-valued field of an object
/// 4. a single object that is itself a record (wrapped into a one-element list)
pub fn extract_record_array(value: &Value, hint: &str) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::Object(map) => {
            let hint = hint.to_lowercase();
            let by_hint = map.iter().find_map(|(key, v)| {
                let key = key.trim().trim_matches(['"', '\'']).trim().to_lowercase();
                (key.contains(&hint) && v.is_array()).then_some(v)
            });
            if let Some(Value::Array(items)) = by_hint {
                return Some(items.clone());
            }
            if let Some(Value::Array(items)) = map.values().find(|v| v.is_array()) {
                return Some(items.clone());
            }
            (!map.is_empty()).then(|| vec![value.clone()])
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_array() {
        let items = extract_record_array(&json!([{"name": "a"}, {"name": "b"}]), "persona");
        assert_eq!(items.unwrap().len(), 2);
    }

    #[test]
    fn test_hinted_key_with_stray_quotes() {
        let payload = json!({"notes": ["x"], " \"Personas\" ": [{"name": "a"}]});
        let items = extract_record_array(&payload, "persona").unwrap();
        assert_eq!(items[0]["name"], "a");
    }

    #[test]
    fn test_first_array_value() {
        let payload = json!({"count": 2, "results": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(extract_record_array(&payload, "persona").unwrap().len(), 2);
    }

    #[test]
    fn test_single_record_object() {
        let payload = json!({"name": "solo", "age": 40});
        let items = extract_record_array(&payload, "persona").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "solo");
    }

    #[test]
    fn test_scalars_rejected() {
        assert!(extract_record_array(&json!("nope"), "persona").is_none());
        assert!(extract_record_array(&json!({}), "persona").is_none());
    }
}
