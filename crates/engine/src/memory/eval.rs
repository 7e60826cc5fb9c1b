//! Query evaluation against JSON documents
//!
//! Field paths are dotted; arrays anywhere along a path are flattened, so a
//! multi-valued field matches when any of its values does. Comparisons
//! coerce between numbers, numeric strings, RFC 3339 dates and IP
//! addresses the way a typed mapping would.

use chrono::DateTime;
use serde_json::{Map, Value};
use siftlog_query::{Query, RangeQuery, SortField};
use std::cmp::Ordering;
use std::net::IpAddr;

// ============================================================================
// Field access
// ============================================================================

/// All non-null leaf values at `path`
pub(crate) fn field_values<'a>(source: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![source];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            collect_child(value, segment, &mut next);
        }
        current = next;
    }
    let mut leaves = Vec::new();
    for value in current {
        flatten(value, &mut leaves);
    }
    leaves
}

fn collect_child<'a>(value: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(obj) => {
            if let Some(child) = obj.get(segment) {
                out.push(child);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_child(v, segment, out)),
        _ => {}
    }
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Null => {}
        Value::Array(items) => items.iter().for_each(|v| flatten(v, out)),
        other => out.push(other),
    }
}

/// Objects stored under `path`, each wrapped back into a document of its own
pub(crate) fn nested_documents(source: &Value, path: &str) -> Vec<Value> {
    let mut current = vec![source];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            collect_child(value, segment, &mut next);
        }
        current = next;
    }
    let mut objects = Vec::new();
    for value in current {
        match value {
            Value::Array(items) => objects.extend(items.iter().filter(|v| v.is_object())),
            Value::Object(_) => objects.push(value),
            _ => {}
        }
    }
    objects.into_iter().map(|obj| wrap(path, obj.clone())).collect()
}

fn wrap(path: &str, inner: Value) -> Value {
    path.rsplit('.').fold(inner, |acc, segment| {
        let mut obj = Map::new();
        obj.insert(segment.to_string(), acc);
        Value::Object(obj)
    })
}

// ============================================================================
// Comparison
// ============================================================================

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_date_millis(value: &Value) -> Option<i64> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.timestamp_millis())
}

/// Order two scalar values, or `None` when they are not comparable
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => {
            if let (Some(dx), Some(dy)) = (as_date_millis(a), as_date_millis(b)) {
                return Some(dx.cmp(&dy));
            }
            if let (Ok(ix), Ok(iy)) = (x.parse::<IpAddr>(), y.parse::<IpAddr>()) {
                return Some(ix.cmp(&iy));
            }
            Some(x.cmp(y))
        }
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            as_number(a)?.partial_cmp(&as_number(b)?)
        }
        (Value::Bool(x), Value::String(s)) | (Value::String(s), Value::Bool(x)) => {
            (s == if *x { "true" } else { "false" }).then_some(Ordering::Equal)
        }
        _ => None,
    }
}

fn values_equal(doc_value: &Value, query_value: &Value) -> bool {
    if doc_value == query_value {
        return true;
    }
    if let (Some(ip), Some(cidr)) = (doc_value.as_str(), query_value.as_str()) {
        if let Some(contained) = cidr_contains(cidr, ip) {
            return contained;
        }
    }
    compare_values(doc_value, query_value) == Some(Ordering::Equal)
}

/// Whether `addr` falls inside `cidr`; `None` when `cidr` is not a CIDR
fn cidr_contains(cidr: &str, addr: &str) -> Option<bool> {
    let (net, prefix) = cidr.split_once('/')?;
    let net: IpAddr = net.parse().ok()?;
    let prefix: u32 = prefix.parse().ok()?;
    let Ok(addr) = addr.parse::<IpAddr>() else {
        return Some(false);
    };
    Some(match (net, addr) {
        (IpAddr::V4(n), IpAddr::V4(a)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            u32::from(n) & mask == u32::from(a) & mask
        }
        (IpAddr::V6(n), IpAddr::V6(a)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
            u128::from(n) & mask == u128::from(a) & mask
        }
        _ => false,
    })
}

/// Glob match supporting `*` and `?`
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ============================================================================
// Matching
// ============================================================================

/// Whether the document `id` with `source` satisfies `query`
pub(crate) fn matches(query: &Query, id: &str, source: &Value) -> bool {
    match query {
        Query::MatchAll => true,
        Query::Term { field, value } => field_values(source, field)
            .into_iter()
            .any(|v| values_equal(v, value)),
        Query::Terms { field, values } => field_values(source, field)
            .into_iter()
            .any(|v| values.iter().any(|q| values_equal(v, q))),
        Query::Wildcard { field, value } => field_values(source, field)
            .into_iter()
            .filter_map(scalar_text)
            .any(|text| glob_match(value, &text)),
        Query::Range(range) => field_values(source, &range.field)
            .into_iter()
            .any(|v| in_range(v, range)),
        Query::Exists { field } => !field_values(source, field).is_empty(),
        Query::Ids { values } => values.iter().any(|v| v == id),
        Query::Nested { path, query } => nested_documents(source, path)
            .iter()
            .any(|doc| matches(query, id, doc)),
        Query::Bool(b) => {
            b.must.iter().chain(&b.filter).all(|q| matches(q, id, source))
                && !b.must_not.iter().any(|q| matches(q, id, source))
                && b.should.iter().filter(|q| matches(q, id, source)).count()
                    >= b.effective_minimum_should_match() as usize
        }
    }
}

fn in_range(value: &Value, range: &RangeQuery) -> bool {
    bound_holds(value, &range.gt, |o| o == Ordering::Greater)
        && bound_holds(value, &range.gte, |o| o != Ordering::Less)
        && bound_holds(value, &range.lt, |o| o == Ordering::Less)
        && bound_holds(value, &range.lte, |o| o != Ordering::Greater)
}

fn bound_holds(value: &Value, bound: &Option<Value>, accept: fn(Ordering) -> bool) -> bool {
    match bound {
        None => true,
        Some(b) => compare_values(value, b).map(accept).unwrap_or(false),
    }
}

// ============================================================================
// Sorting
// ============================================================================

/// Sort values of a document: the first value of every sort field, or null
pub(crate) fn sort_values(source: &Value, sort: &[SortField]) -> Vec<Value> {
    sort.iter()
        .map(|s| {
            field_values(source, &s.field)
                .first()
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null)
        })
        .collect()
}

/// Order one sort key; missing values sort last in either direction
pub(crate) fn compare_sort_value(a: &Value, b: &Value, descending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = compare_values(a, b).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

/// Order two sort tuples. Positions past `sort` are tie-breakers, ascending.
pub(crate) fn compare_sort_tuple(a: &[Value], b: &[Value], sort: &[SortField]) -> Ordering {
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        let descending = sort.get(i).map(|s| s.descending).unwrap_or(false);
        let ord = compare_sort_value(x, y, descending);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
