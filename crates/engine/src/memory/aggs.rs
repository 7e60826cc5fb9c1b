//! Aggregation evaluation over matched documents
//!
//! Results use the engine's response shape: metric aggregations yield
//! `{"value": ...}`, bucket aggregations yield `{"buckets": [...]}` with
//! sub-aggregation results inlined in each bucket.

use super::eval::{compare_sort_value, compare_values, field_values, nested_documents};
use serde_json::{json, Map, Value};
use siftlog_query::{Aggregation, CompositeSource, SortOrder, SubAggregations};
use std::cmp::Ordering;

/// Evaluate named aggregations over `docs`
pub(crate) fn evaluate(aggs: &SubAggregations, docs: &[&Value]) -> Map<String, Value> {
    aggs.iter()
        .map(|(name, agg)| (name.clone(), evaluate_one(agg, docs)))
        .collect()
}

fn numbers(docs: &[&Value], field: &str) -> Vec<f64> {
    docs.iter()
        .flat_map(|d| field_values(d, field))
        .filter_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        })
        .collect()
}

fn evaluate_one(agg: &Aggregation, docs: &[&Value]) -> Value {
    match agg {
        Aggregation::Sum { field } => json!({"value": numbers(docs, field).iter().sum::<f64>()}),
        Aggregation::Min { field } => {
            json!({"value": numbers(docs, field).into_iter().reduce(f64::min)})
        }
        Aggregation::Max { field } => {
            json!({"value": numbers(docs, field).into_iter().reduce(f64::max)})
        }
        Aggregation::Avg { field } => {
            let values = numbers(docs, field);
            let avg = (!values.is_empty())
                .then(|| values.iter().sum::<f64>() / values.len() as f64);
            json!({"value": avg})
        }
        Aggregation::WeightedAvg {
            value_field,
            weight_field,
        } => {
            let (mut weighted, mut weights) = (0.0, 0.0);
            for doc in docs {
                let value = numbers(&[*doc], value_field);
                let weight = numbers(&[*doc], weight_field);
                if let (Some(v), Some(w)) = (value.first(), weight.first()) {
                    weighted += v * w;
                    weights += w;
                }
            }
            let avg = (weights != 0.0).then(|| weighted / weights);
            json!({"value": avg})
        }
        Aggregation::ValueCount { field } => {
            let count: usize = docs.iter().map(|d| field_values(d, field).len()).sum();
            json!({"value": count})
        }
        Aggregation::Nested { path, aggs } => {
            let nested: Vec<Value> = docs.iter().flat_map(|d| nested_documents(d, path)).collect();
            let refs: Vec<&Value> = nested.iter().collect();
            with_sub_aggs(json!({"doc_count": refs.len()}), aggs, &refs)
        }
        Aggregation::Terms { field, size, aggs } => terms(field, *size, aggs, docs),
        Aggregation::Composite {
            size,
            sources,
            after,
            aggs,
        } => composite(*size, sources, after.as_ref(), aggs, docs),
    }
}

fn with_sub_aggs(mut bucket: Value, aggs: &SubAggregations, docs: &[&Value]) -> Value {
    if let Some(obj) = bucket.as_object_mut() {
        obj.extend(evaluate(aggs, docs));
    }
    bucket
}

/// Group `docs` by `key_of`; a document may land in several groups
fn group_by<'a>(
    docs: &[&'a Value],
    key_of: impl Fn(&'a Value) -> Vec<Vec<Value>>,
    order: impl Fn(&[Value], &[Value]) -> Ordering,
) -> Vec<(Vec<Value>, Vec<&'a Value>)> {
    let mut keyed: Vec<(Vec<Value>, &'a Value)> = Vec::new();
    for &doc in docs {
        for key in key_of(doc) {
            keyed.push((key, doc));
        }
    }
    keyed.sort_by(|a, b| order(a.0.as_slice(), b.0.as_slice()));
    let mut groups: Vec<(Vec<Value>, Vec<&'a Value>)> = Vec::new();
    for (key, doc) in keyed {
        match groups.last_mut() {
            Some((last, members)) if order(last.as_slice(), key.as_slice()) == Ordering::Equal => {
                members.push(doc)
            }
            _ => groups.push((key, vec![doc])),
        }
    }
    groups
}

fn terms(field: &str, size: usize, aggs: &SubAggregations, docs: &[&Value]) -> Value {
    let mut groups = group_by(
        docs,
        |doc| {
            let mut keys: Vec<Vec<Value>> = Vec::new();
            for v in field_values(doc, field) {
                let key = vec![v.clone()];
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            keys
        },
        |a, b| compare_sort_value(&a[0], &b[0], false),
    );
    groups.sort_by(|a, b| {
        b.1.len()
            .cmp(&a.1.len())
            .then_with(|| compare_sort_value(&a.0[0], &b.0[0], false))
    });
    let other: usize = groups.iter().skip(size).map(|g| g.1.len()).sum();
    let buckets: Vec<Value> = groups
        .into_iter()
        .take(size)
        .map(|(key, members)| {
            with_sub_aggs(json!({"key": key[0], "doc_count": members.len()}), aggs, &members)
        })
        .collect();
    json!({
        "doc_count_error_upper_bound": 0,
        "sum_other_doc_count": other,
        "buckets": buckets,
    })
}

/// Every key combination of one document; empty when a required source is
/// missing
fn composite_keys(doc: &Value, sources: &[CompositeSource]) -> Vec<Vec<Value>> {
    let mut keys: Vec<Vec<Value>> = vec![Vec::new()];
    for source in sources {
        let mut values: Vec<Value> = Vec::new();
        for v in field_values(doc, &source.field) {
            if !values.contains(v) {
                values.push(v.clone());
            }
        }
        if values.is_empty() {
            if !source.missing_bucket {
                return Vec::new();
            }
            values.push(Value::Null);
        }
        keys = keys
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |v| {
                    let mut key = prefix.clone();
                    key.push(v.clone());
                    key
                })
            })
            .collect();
    }
    keys
}

/// Missing values sort first ascending and last descending
fn compare_composite(a: &[Value], b: &[Value], sources: &[CompositeSource]) -> Ordering {
    for ((x, y), source) in a.iter().zip(b).zip(sources) {
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => compare_values(x, y).unwrap_or(Ordering::Equal),
        };
        let ord = match source.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn key_object(key: &[Value], sources: &[CompositeSource]) -> Value {
    Value::Object(
        sources
            .iter()
            .zip(key)
            .map(|(s, v)| (s.name.clone(), v.clone()))
            .collect(),
    )
}

fn composite(
    size: usize,
    sources: &[CompositeSource],
    after: Option<&Map<String, Value>>,
    aggs: &SubAggregations,
    docs: &[&Value],
) -> Value {
    let groups = group_by(
        docs,
        |doc| composite_keys(doc, sources),
        |a, b| compare_composite(a, b, sources),
    );
    let after_key: Option<Vec<Value>> = after.map(|after| {
        sources
            .iter()
            .map(|s| after.get(&s.name).cloned().unwrap_or(Value::Null))
            .collect()
    });
    let page: Vec<(Vec<Value>, Vec<&Value>)> = groups
        .into_iter()
        .filter(|(key, _)| match &after_key {
            Some(after) => compare_composite(key, after, sources) == Ordering::Greater,
            None => true,
        })
        .take(size)
        .collect();

    let mut result = Map::new();
    if let Some((last, _)) = page.last() {
        result.insert("after_key".to_string(), key_object(last, sources));
    }
    let buckets: Vec<Value> = page
        .iter()
        .map(|(key, members)| {
            with_sub_aggs(
                json!({"key": key_object(key, sources), "doc_count": members.len()}),
                aggs,
                members,
            )
        })
        .collect();
    result.insert("buckets".to_string(), Value::Array(buckets));
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Value> {
        vec![
            json!({
                "proto": "tcp",
                "action": "allow",
                "bytes": 10,
                "policies": [{"name": "a"}, {"name": "b"}]
            }),
            json!({"proto": "tcp", "action": "deny", "bytes": 20, "policies": [{"name": "a"}]}),
            json!({"proto": "udp", "action": "allow", "bytes": 5}),
            json!({"action": "allow", "bytes": 1}),
        ]
    }

    fn source(name: &str, order: SortOrder, missing_bucket: bool) -> CompositeSource {
        CompositeSource {
            name: name.into(),
            field: name.into(),
            order,
            missing_bucket,
        }
    }

    #[test]
    fn test_metrics() {
        let owned = docs();
        let refs: Vec<&Value> = owned.iter().collect();
        let mut aggs = SubAggregations::new();
        aggs.insert("sum".into(), Aggregation::Sum { field: "bytes".into() });
        aggs.insert("min".into(), Aggregation::Min { field: "bytes".into() });
        aggs.insert("max".into(), Aggregation::Max { field: "bytes".into() });
        aggs.insert("avg".into(), Aggregation::Avg { field: "bytes".into() });
        aggs.insert("none".into(), Aggregation::Max { field: "absent".into() });
        let out = evaluate(&aggs, &refs);
        assert_eq!(out["sum"]["value"], 36.0);
        assert_eq!(out["min"]["value"], 1.0);
        assert_eq!(out["max"]["value"], 20.0);
        assert_eq!(out["avg"]["value"], 9.0);
        assert!(out["none"]["value"].is_null());
    }

    #[test]
    fn test_terms_orders_by_count() {
        let owned = docs();
        let refs: Vec<&Value> = owned.iter().collect();
        let mut sub = SubAggregations::new();
        sub.insert("bytes".into(), Aggregation::Sum { field: "bytes".into() });
        let out = evaluate_one(
            &Aggregation::Terms {
                field: "action".into(),
                size: 1,
                aggs: sub,
            },
            &refs,
        );
        assert_eq!(out["buckets"][0]["key"], "allow");
        assert_eq!(out["buckets"][0]["doc_count"], 3);
        assert_eq!(out["buckets"][0]["bytes"]["value"], 16.0);
        assert_eq!(out["sum_other_doc_count"], 1);
    }

    #[test]
    fn test_nested_counts_elements() {
        let owned = docs();
        let refs: Vec<&Value> = owned.iter().collect();
        let mut sub = SubAggregations::new();
        sub.insert(
            "names".into(),
            Aggregation::Terms {
                field: "policies.name".into(),
                size: 10,
                aggs: SubAggregations::new(),
            },
        );
        let out = evaluate_one(
            &Aggregation::Nested {
                path: "policies".into(),
                aggs: sub,
            },
            &refs,
        );
        assert_eq!(out["doc_count"], 3);
        assert_eq!(out["names"]["buckets"][0]["key"], "a");
        assert_eq!(out["names"]["buckets"][0]["doc_count"], 2);
    }

    #[test]
    fn test_composite_paging_and_missing_bucket() {
        let owned = docs();
        let refs: Vec<&Value> = owned.iter().collect();
        let sources = vec![
            source("proto", SortOrder::Asc, true),
            source("action", SortOrder::Asc, false),
        ];
        let agg = |after: Option<Map<String, Value>>| Aggregation::Composite {
            size: 2,
            sources: sources.clone(),
            after,
            aggs: SubAggregations::new(),
        };
        let first = evaluate_one(&agg(None), &refs);
        let buckets = first["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 2);
        assert!(buckets[0]["key"]["proto"].is_null());
        assert_eq!(buckets[1]["key"], json!({"proto": "tcp", "action": "allow"}));

        let after = first["after_key"].as_object().cloned();
        let second = evaluate_one(&agg(after), &refs);
        let buckets = second["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0]["key"], json!({"proto": "tcp", "action": "deny"}));
        assert_eq!(buckets[1]["key"], json!({"proto": "udp", "action": "allow"}));

        let after = second["after_key"].as_object().cloned();
        let third = evaluate_one(&agg(after), &refs);
        assert!(third["buckets"].as_array().unwrap().is_empty());
        assert!(third.get("after_key").is_none());
    }

    #[test]
    fn test_composite_without_missing_bucket_skips_docs() {
        let owned = docs();
        let refs: Vec<&Value> = owned.iter().collect();
        let out = evaluate_one(
            &Aggregation::Composite {
                size: 10,
                sources: vec![source("proto", SortOrder::Desc, false)],
                after: None,
                aggs: SubAggregations::new(),
            },
            &refs,
        );
        let keys: Vec<&Value> = out["buckets"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| &b["key"]["proto"])
            .collect();
        assert_eq!(keys, vec![&json!("udp"), &json!("tcp")]);
    }
}
