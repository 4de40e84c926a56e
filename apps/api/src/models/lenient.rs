//! Tolerant field deserializers for user-authored and upstream JSON.
//!
//! Estimate records come from a CRUD layer that stores numbers as strings more
//! often than not, and template configurations are hand-edited. None of these
//! helpers fail: a value that cannot be interpreted becomes the field's
//! neutral value (`0.0`, `None`, `false`, the type's default).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Interprets a JSON value as a number. Numeric strings (with optional `$`
/// and thousands separators) are accepted. Anything else yields `None`.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Interprets a JSON value as display text. Numbers and booleans are
/// stringified; blank strings count as absent.
pub fn value_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Number field; unparseable or missing → `0.0`.
pub fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value).unwrap_or(0.0))
}

/// Optional number field; unparseable → `None`.
pub fn opt_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value))
}

/// Optional text field; blank, null, arrays and objects → `None`.
pub fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

/// Required-ish text field; anything unusable → empty string.
pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value).unwrap_or_default())
}

/// Boolean flag; unrecognized → `false`.
pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_bool(&value).unwrap_or(false))
}

/// Boolean flag that defaults to `true` when unrecognized.
pub fn flag_default_on<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_bool(&value).unwrap_or(true))
}

/// Integer ordering key; unparseable → `0`.
pub fn order<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value).map(|n| n as i64).unwrap_or(0))
}

/// Nested object; `null`, scalars and arrays → `T::default()`.
pub fn bag<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_bag(value))
}

/// Array of objects; entries that are not objects are dropped, and a
/// non-array value yields an empty list.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_list(value))
}

pub fn value_to_bag<T: DeserializeOwned + Default>(value: Value) -> T {
    if !value.is_object() {
        return T::default();
    }
    serde_json::from_value(value).unwrap_or_default()
}

pub fn value_to_list<T: DeserializeOwned>(value: Value) -> Vec<T> {
    let Value::Array(entries) = value else {
        return Vec::new();
    };
    entries
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_to_f64_accepts_numeric_strings() {
        assert_eq!(value_to_f64(&json!("1,250.50")), Some(1250.5));
        assert_eq!(value_to_f64(&json!(" $40 ")), Some(40.0));
        assert_eq!(value_to_f64(&json!(12)), Some(12.0));
    }

    #[test]
    fn test_value_to_f64_rejects_garbage() {
        assert_eq!(value_to_f64(&json!("twelve")), None);
        assert_eq!(value_to_f64(&json!(null)), None);
        assert_eq!(value_to_f64(&json!({"a": 1})), None);
        assert_eq!(value_to_f64(&json!("NaN")), None);
    }

    #[test]
    fn test_value_to_string_blank_is_absent() {
        assert_eq!(value_to_string(&json!("   ")), None);
        assert_eq!(value_to_string(&json!(42)), Some("42".to_string()));
        assert_eq!(value_to_string(&json!(["x"])), None);
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Pair {
        #[serde(default, deserialize_with = "text")]
        name: String,
    }

    #[test]
    fn test_value_to_bag_defaults_non_objects() {
        assert_eq!(value_to_bag::<Pair>(json!(null)), Pair::default());
        assert_eq!(value_to_bag::<Pair>(json!("Acme")), Pair::default());
        assert_eq!(value_to_bag::<Pair>(json!({"name": "Acme"})).name, "Acme");
    }

    #[test]
    fn test_value_to_list_keeps_only_objects() {
        let pairs: Vec<Pair> = value_to_list(json!([{"name": "a"}, null, 7, {"name": "b"}]));
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].name, "b");
        assert!(value_to_list::<Pair>(json!(null)).is_empty());
    }

    #[test]
    fn test_value_to_bool_variants() {
        assert_eq!(value_to_bool(&json!("TRUE")), Some(true));
        assert_eq!(value_to_bool(&json!(0)), Some(false));
        assert_eq!(value_to_bool(&json!("maybe")), None);
    }
}
