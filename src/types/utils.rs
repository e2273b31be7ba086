//! Lenient extraction helpers for generated JSON records.
//!
//! Providers return loosely typed payloads: numbers as strings, lists as
//! comma-separated text, scalars where arrays were requested. These helpers
//! normalize a single `serde_json::Value` without failing.

use serde_json::Value;
use std::fmt::Display;

// =============================================================================
// JSON Value Extraction Helpers
// =============================================================================

/// Render a scalar as a string. Null and containers become empty.
#[inline]
pub fn json_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Accept an array of scalars or a comma-separated string.
pub fn json_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(json_string)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Accept an integer, an integral float, or a numeric string.
pub fn json_u8(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&number) {
        return None;
    }
    Some(number as u8)
}

// =============================================================================
// Result Filtering
// =============================================================================

/// Filter an iterator of Results, logging discarded errors at warn level.
///
/// Use instead of `.filter_map(|r| r.ok())` when dropped items matter.
pub fn log_filter_warn<T, E: Display>(result: Result<T, E>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{}: {}", context, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_string_scalars() {
        assert_eq!(json_string(&json!("  padded ")), "padded");
        assert_eq!(json_string(&json!(42)), "42");
        assert_eq!(json_string(&Value::Null), "");
        assert_eq!(json_string(&json!(["a"])), "");
    }

    #[test]
    fn test_json_string_list_shapes() {
        assert_eq!(json_string_list(&json!(["a", "b"])), vec!["a", "b"]);
        assert_eq!(json_string_list(&json!("a, b,,c")), vec!["a", "b", "c"]);
        assert!(json_string_list(&json!(7)).is_empty());
    }

    #[test]
    fn test_json_u8() {
        assert_eq!(json_u8(&json!(32)), Some(32));
        assert_eq!(json_u8(&json!(" 41 ")), Some(41));
        assert_eq!(json_u8(&json!(3.0)), Some(3));
        assert_eq!(json_u8(&json!(3.5)), None);
        assert_eq!(json_u8(&json!(-1)), None);
        assert_eq!(json_u8(&json!(300)), None);
        assert_eq!(json_u8(&json!("old")), None);
    }

    #[test]
    fn test_log_filter_warn() {
        let ok: Result<u8, String> = Ok(1);
        let err: Result<u8, String> = Err("bad".into());
        assert_eq!(log_filter_warn(ok, "ctx"), Some(1));
        assert_eq!(log_filter_warn(err, "ctx"), None);
    }
}
