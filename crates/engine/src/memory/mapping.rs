//! Enforcement of typed index mappings on write
//!
//! Fields absent from the mapping are accepted as-is (dynamic mapping).
//! Mapped fields must parse as their declared type, for every element when
//! the value is an array.

use chrono::DateTime;
use serde_json::{Map, Value};
use std::net::IpAddr;

/// Check `doc` against `mappings` (`{"properties": {...}}`).
///
/// Returns the engine-style failure reason for the first offending field.
pub(crate) fn validate(mappings: &Value, doc: &Value) -> Result<(), String> {
    match (mappings.get("properties").and_then(Value::as_object), doc.as_object()) {
        (Some(props), Some(obj)) => validate_object(props, obj, ""),
        _ => Ok(()),
    }
}

fn validate_object(
    props: &Map<String, Value>,
    obj: &Map<String, Value>,
    prefix: &str,
) -> Result<(), String> {
    for (key, value) in obj {
        let Some(mapping) = props.get(key) else {
            continue;
        };
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        validate_value(mapping, value, &path)?;
    }
    Ok(())
}

fn validate_value(mapping: &Value, value: &Value, path: &str) -> Result<(), String> {
    if let Value::Array(items) = value {
        return items.iter().try_for_each(|v| validate_value(mapping, v, path));
    }
    if value.is_null() {
        return Ok(());
    }
    let kind = mapping.get("type").and_then(Value::as_str).unwrap_or("object");
    if let Some(props) = mapping.get("properties").and_then(Value::as_object) {
        return match value.as_object() {
            Some(obj) => validate_object(props, obj, path),
            None => Err(format!(
                "object mapping for [{path}] tried to parse field [{path}] as object, \
                 but found a concrete value"
            )),
        };
    }
    let epoch_second = mapping.get("format").and_then(Value::as_str) == Some("epoch_second");
    let ok = match kind {
        "keyword" | "text" => !value.is_object(),
        "long" | "integer" | "short" => is_integer(value),
        "double" | "float" => as_f64(value).is_some(),
        "boolean" => {
            matches!(value, Value::Bool(_)) || matches!(value.as_str(), Some("true" | "false"))
        }
        "ip" => value.as_str().map(|s| s.parse::<IpAddr>().is_ok()).unwrap_or(false),
        "date" if epoch_second => is_integer(value),
        "date" => is_integer(value) || value.as_str().map(is_date).unwrap_or(false),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!(
            "failed to parse field [{path}] of type [{kind}]. Preview of field's value: '{}'",
            preview(value)
        ))
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
        }
        Value::String(s) => s.parse::<i64>().is_ok(),
        _ => false,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn is_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

fn preview(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mappings() -> Value {
        json!({"properties": {
            "source_ip": {"type": "ip"},
            "bytes_in": {"type": "long"},
            "start_time": {"type": "date", "format": "epoch_second"},
            "generated_time": {"type": "date"},
            "policies": {"type": "nested", "properties": {"all_policies": {"type": "keyword"}}}
        }})
    }

    #[test]
    fn test_accepts_well_typed_document() {
        let doc = json!({
            "source_ip": "10.0.0.1",
            "bytes_in": 10,
            "start_time": 1700000000,
            "generated_time": "2024-01-01T00:00:00.000Z",
            "policies": {"all_policies": ["a", "b"]},
            "unmapped": {"anything": true}
        });
        assert!(validate(&mappings(), &doc).is_ok());
    }

    #[test]
    fn test_rejects_bad_ip() {
        let err = validate(&mappings(), &json!({"source_ip": "not-an-ip"})).unwrap_err();
        assert!(err.contains("[source_ip]"));
        assert!(err.contains("[ip]"));
    }

    #[test]
    fn test_rejects_bad_nested_and_array_elements() {
        assert!(validate(&mappings(), &json!({"bytes_in": [1, "x"]})).is_err());
        assert!(validate(&mappings(), &json!({"policies": "flat"})).is_err());
        assert!(validate(&mappings(), &json!({"start_time": "2024-01-01T00:00:00Z"})).is_err());
    }
}
