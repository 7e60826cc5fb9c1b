//! Aggregation requests
//!
//! [`Aggregation`] mirrors the engine's aggregation DSL for the kinds the
//! backend supports. Requests arriving as raw JSON are parsed with
//! [`Aggregation::from_json`]; anything else is rejected up front instead of
//! being forwarded blindly.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use siftlog_core::{Error, Result};
use std::collections::BTreeMap;

/// Named sub-aggregations
pub type SubAggregations = BTreeMap<String, Aggregation>;

/// Ordering of a composite source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One group-by dimension of a composite aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeSource {
    pub name: String,
    pub field: String,
    pub order: SortOrder,
    /// Keep documents lacking the field in a `null` bucket
    pub missing_bucket: bool,
}

/// Supported aggregation kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Terms {
        field: String,
        size: usize,
        aggs: SubAggregations,
    },
    Sum {
        field: String,
    },
    Min {
        field: String,
    },
    Max {
        field: String,
    },
    Avg {
        field: String,
    },
    WeightedAvg {
        value_field: String,
        weight_field: String,
    },
    ValueCount {
        field: String,
    },
    Nested {
        path: String,
        aggs: SubAggregations,
    },
    Composite {
        size: usize,
        sources: Vec<CompositeSource>,
        after: Option<Map<String, Value>>,
        aggs: SubAggregations,
    },
}

const DEFAULT_TERMS_SIZE: usize = 10;

impl Aggregation {
    /// Render as engine JSON
    pub fn to_json(&self) -> Value {
        let (body, aggs) = match self {
            Aggregation::Terms { field, size, aggs } => {
                (json!({"terms": {"field": field, "size": size}}), Some(aggs))
            }
            Aggregation::Sum { field } => (json!({"sum": {"field": field}}), None),
            Aggregation::Min { field } => (json!({"min": {"field": field}}), None),
            Aggregation::Max { field } => (json!({"max": {"field": field}}), None),
            Aggregation::Avg { field } => (json!({"avg": {"field": field}}), None),
            Aggregation::WeightedAvg {
                value_field,
                weight_field,
            } => (
                json!({"weighted_avg": {
                    "value": {"field": value_field},
                    "weight": {"field": weight_field}
                }}),
                None,
            ),
            Aggregation::ValueCount { field } => (json!({"value_count": {"field": field}}), None),
            Aggregation::Nested { path, aggs } => (json!({"nested": {"path": path}}), Some(aggs)),
            Aggregation::Composite {
                size,
                sources,
                after,
                aggs,
            } => {
                let sources: Vec<Value> = sources
                    .iter()
                    .map(|s| {
                        json!({s.name.as_str(): {"terms": {
                            "field": s.field,
                            "order": s.order.as_str(),
                            "missing_bucket": s.missing_bucket,
                        }}})
                    })
                    .collect();
                let mut composite = json!({"size": size, "sources": sources});
                if let (Some(after), Some(obj)) = (after, composite.as_object_mut()) {
                    obj.insert("after".to_string(), Value::Object(after.clone()));
                }
                (json!({"composite": composite}), Some(aggs))
            }
        };
        match (body, aggs) {
            (Value::Object(mut obj), Some(aggs)) if !aggs.is_empty() => {
                obj.insert("aggs".to_string(), aggs_to_json(aggs));
                Value::Object(obj)
            }
            (body, _) => body,
        }
    }

    /// Parse one aggregation from engine JSON
    pub fn from_json(name: &str, value: &Value) -> Result<Aggregation> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::invalid_request(format!("aggregation {name} is not an object")))?;
        let aggs = match obj.get("aggs").or_else(|| obj.get("aggregations")) {
            Some(sub) => aggs_from_json(sub)?,
            None => SubAggregations::new(),
        };
        let mut kinds = obj
            .iter()
            .filter(|(k, _)| k.as_str() != "aggs" && k.as_str() != "aggregations");
        let (kind, body) = match (kinds.next(), kinds.next()) {
            (Some(kind), None) => kind,
            _ => {
                return Err(Error::invalid_request(format!(
                    "aggregation {name} must have exactly one type"
                )))
            }
        };
        let field = || str_field(name, body, "field");
        let agg = match kind.as_str() {
            "terms" => Aggregation::Terms {
                field: field()?,
                size: body
                    .get("size")
                    .and_then(Value::as_u64)
                    .map(|s| s as usize)
                    .unwrap_or(DEFAULT_TERMS_SIZE),
                aggs,
            },
            "sum" => Aggregation::Sum { field: field()? },
            "min" => Aggregation::Min { field: field()? },
            "max" => Aggregation::Max { field: field()? },
            "avg" => Aggregation::Avg { field: field()? },
            "value_count" => Aggregation::ValueCount { field: field()? },
            "weighted_avg" => Aggregation::WeightedAvg {
                value_field: str_field(name, body.get("value").unwrap_or(&Value::Null), "field")?,
                weight_field: str_field(name, body.get("weight").unwrap_or(&Value::Null), "field")?,
            },
            "nested" => Aggregation::Nested {
                path: str_field(name, body, "path")?,
                aggs,
            },
            "composite" => composite_from_json(name, body, aggs)?,
            other => {
                return Err(Error::invalid_request(format!(
                    "unsupported aggregation type {other} in {name}"
                )))
            }
        };
        Ok(agg)
    }
}

impl Serialize for Aggregation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Render named aggregations as engine JSON
pub fn aggs_to_json(aggs: &SubAggregations) -> Value {
    Value::Object(aggs.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

/// Parse named aggregations from engine JSON
pub fn aggs_from_json(value: &Value) -> Result<SubAggregations> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::invalid_request("aggregations must be an object"))?;
    obj.iter()
        .map(|(name, body)| Ok((name.clone(), Aggregation::from_json(name, body)?)))
        .collect()
}

fn str_field(name: &str, body: &Value, key: &str) -> Result<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_request(format!("aggregation {name} is missing {key}")))
}

fn composite_from_json(name: &str, body: &Value, aggs: SubAggregations) -> Result<Aggregation> {
    let size = body
        .get("size")
        .and_then(Value::as_u64)
        .map(|s| s as usize)
        .unwrap_or(DEFAULT_TERMS_SIZE);
    let raw_sources = body
        .get("sources")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::invalid_request(format!("aggregation {name} has no sources")))?;
    let mut sources = Vec::with_capacity(raw_sources.len());
    for raw in raw_sources {
        let (source_name, spec) = raw
            .as_object()
            .and_then(|o| o.iter().next())
            .ok_or_else(|| {
                Error::invalid_request(format!("aggregation {name} has a malformed source"))
            })?;
        let terms = spec.get("terms").ok_or_else(|| {
            Error::invalid_request(format!("source {source_name} of {name} must be a terms source"))
        })?;
        let order = match terms.get("order").and_then(Value::as_str) {
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        };
        sources.push(CompositeSource {
            name: source_name.clone(),
            field: str_field(source_name, terms, "field")?,
            order,
            missing_bucket: terms
                .get("missing_bucket")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        });
    }
    Ok(Aggregation::Composite {
        size,
        sources,
        after: body.get("after").and_then(Value::as_object).cloned(),
        aggs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render_terms_with_sub_aggs() {
        let raw = json!({
            "by_action": {
                "terms": {"field": "action", "size": 5},
                "aggs": {"bytes": {"sum": {"field": "bytes_in"}}}
            }
        });
        let aggs = aggs_from_json(&raw).unwrap();
        match &aggs["by_action"] {
            Aggregation::Terms { field, size, aggs } => {
                assert_eq!(field, "action");
                assert_eq!(*size, 5);
                assert_eq!(aggs["bytes"], Aggregation::Sum { field: "bytes_in".into() });
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(aggs_to_json(&aggs), raw);
    }

    #[test]
    fn test_composite_json() {
        let agg = Aggregation::Composite {
            size: 10,
            sources: vec![CompositeSource {
                name: "proto".into(),
                field: "proto".into(),
                order: SortOrder::Desc,
                missing_bucket: true,
            }],
            after: None,
            aggs: SubAggregations::new(),
        };
        assert_eq!(
            agg.to_json(),
            json!({"composite": {"size": 10, "sources": [
                {"proto": {"terms": {"field": "proto", "order": "desc", "missing_bucket": true}}}
            ]}})
        );
        let parsed = Aggregation::from_json("c", &agg.to_json()).unwrap();
        assert_eq!(parsed, agg);
    }

    #[test]
    fn test_unsupported_kind_rejected() {
        let err = aggs_from_json(&json!({"x": {"scripted_metric": {}}})).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("scripted_metric"));
    }

    #[test]
    fn test_two_kinds_rejected() {
        let spec = json!({"sum": {"field": "a"}, "max": {"field": "a"}});
        let err = Aggregation::from_json("x", &spec).unwrap_err();
        assert!(err.to_string().contains("exactly one type"));
    }
}
