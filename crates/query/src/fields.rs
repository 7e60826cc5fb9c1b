//! Searchable fields of a log type
//!
//! A [`FieldSet`] lists the keys a selector may reference, the type each
//! value must parse as, and the nested path (if any) the key lives under.
//! It also renders the index mappings for those fields.

use chrono::DateTime;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Field stamped with the owning cluster on every document
pub const CLUSTER_FIELD: &str = "cluster";
/// Field stamped with the owning tenant when a tenant is set
pub const TENANT_FIELD: &str = "tenant";
/// Field stamped with the ingestion time on every document
pub const GENERATED_TIME_FIELD: &str = "generated_time";

/// Type a field's values must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Any string
    Keyword,
    /// Signed integer
    Integer,
    /// Floating point number
    Double,
    /// IP address or CIDR
    Ip,
    /// `true` or `false`
    Boolean,
    /// RFC 3339 timestamp or epoch milliseconds
    Date,
    /// Date stored as epoch seconds
    EpochSeconds,
    /// One of a fixed set of strings
    OneOf(&'static [&'static str]),
}

impl ValueKind {
    /// Whether `value` is acceptable for this kind
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ValueKind::Keyword => true,
            ValueKind::Integer | ValueKind::EpochSeconds => value.parse::<i64>().is_ok(),
            ValueKind::Double => value.parse::<f64>().is_ok(),
            ValueKind::Ip => parse_ip_or_cidr(value),
            ValueKind::Boolean => matches!(value, "true" | "false"),
            ValueKind::Date => {
                DateTime::parse_from_rfc3339(value).is_ok() || value.parse::<i64>().is_ok()
            }
            ValueKind::OneOf(allowed) => allowed.contains(&value),
        }
    }

    fn mapping(&self) -> Value {
        match self {
            ValueKind::Keyword | ValueKind::OneOf(_) => json!({"type": "keyword"}),
            ValueKind::Integer => json!({"type": "long"}),
            ValueKind::Double => json!({"type": "double"}),
            ValueKind::Ip => json!({"type": "ip"}),
            ValueKind::Boolean => json!({"type": "boolean"}),
            ValueKind::Date => json!({"type": "date"}),
            ValueKind::EpochSeconds => json!({"type": "date", "format": "epoch_second"}),
        }
    }
}

fn parse_ip_or_cidr(value: &str) -> bool {
    match value.split_once('/') {
        Some((addr, prefix)) => {
            let Ok(ip) = addr.parse::<IpAddr>() else {
                return false;
            };
            let max = if ip.is_ipv4() { 32 } else { 128 };
            prefix.parse::<u8>().map(|p| p <= max).unwrap_or(false)
        }
        None => value.parse::<IpAddr>().is_ok(),
    }
}

/// Description of one searchable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: ValueKind,
    /// Path of the nested object array holding the field
    pub nested: Option<&'static str>,
}

impl FieldSpec {
    pub const fn new(kind: ValueKind) -> Self {
        FieldSpec { kind, nested: None }
    }

    pub const fn nested(kind: ValueKind, path: &'static str) -> Self {
        FieldSpec {
            kind,
            nested: Some(path),
        }
    }
}

/// The searchable fields of one log type
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    fields: BTreeMap<&'static str, FieldSpec>,
}

impl FieldSet {
    pub fn new(entries: &[(&'static str, FieldSpec)]) -> Self {
        FieldSet {
            fields: entries.iter().copied().collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// Index mappings for these fields plus the tenancy fields
    pub fn mappings(&self) -> Value {
        let mut root = Map::new();
        insert_mapping(&mut root, CLUSTER_FIELD, ValueKind::Keyword.mapping(), None);
        insert_mapping(&mut root, TENANT_FIELD, ValueKind::Keyword.mapping(), None);
        insert_mapping(&mut root, GENERATED_TIME_FIELD, ValueKind::Date.mapping(), None);
        for (key, spec) in &self.fields {
            insert_mapping(&mut root, key, spec.kind.mapping(), spec.nested);
        }
        json!({"properties": root})
    }
}

/// Place `leaf` at the dotted path `key`, creating object (or nested)
/// parents along the way.
fn insert_mapping(root: &mut Map<String, Value>, key: &str, leaf: Value, nested: Option<&str>) {
    let parts: Vec<&str> = key.split('.').collect();
    let mut props = root;
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            props.insert(part.to_string(), leaf);
            return;
        }
        let prefix = parts[..=i].join(".");
        let entry = props.entry(part.to_string()).or_insert_with(|| {
            if nested == Some(prefix.as_str()) {
                json!({"type": "nested", "properties": {}})
            } else {
                json!({"properties": {}})
            }
        });
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        let next = obj
            .entry("properties".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match next.as_object_mut() {
            Some(map) => props = map,
            None => return,
        }
    }
}
