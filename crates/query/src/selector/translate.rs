//! Lowering of parsed selectors into engine queries

use super::{parse, Atom, Comparator, Expr, Operator, ParseError};
use crate::dsl::{Query, RangeQuery};
use crate::fields::FieldSet;
use siftlog_core::{Error, Result, SelectorErrorKind};

/// Longest selector accepted, in bytes
pub const MAX_SELECTOR_LEN: usize = 64 * 1024;

/// Why an atom was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AtomError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl AtomError {
    fn kind(&self) -> SelectorErrorKind {
        match self {
            AtomError::InvalidKey(_) => SelectorErrorKind::InvalidKey,
            AtomError::InvalidValue { .. } => SelectorErrorKind::InvalidValue,
        }
    }
}

/// Lower a parsed selector, validating every atom against `fields`
pub fn translate(expr: &Expr, fields: &FieldSet) -> std::result::Result<Query, AtomError> {
    match expr {
        Expr::And(parts) => Ok(Query::all_of(
            parts
                .iter()
                .map(|p| translate(p, fields))
                .collect::<std::result::Result<Vec<_>, AtomError>>()?,
        )),
        Expr::Or(parts) => Ok(Query::any_of(
            parts
                .iter()
                .map(|p| translate(p, fields))
                .collect::<std::result::Result<Vec<_>, AtomError>>()?,
        )),
        Expr::Not(inner) => Ok(Query::none_of(vec![translate(inner, fields)?])),
        Expr::Atom(atom) => translate_atom(atom, fields),
    }
}

fn translate_atom(atom: &Atom, fields: &FieldSet) -> std::result::Result<Query, AtomError> {
    let spec = fields
        .get(&atom.key)
        .ok_or_else(|| AtomError::InvalidKey(atom.key.clone()))?;
    for value in &atom.values {
        // Set members may be glob patterns on keyword fields
        let pattern = atom.op != Operator::Cmp(Comparator::Eq)
            && atom.op != Operator::Cmp(Comparator::Ne);
        if !spec.kind.accepts(value) && !(pattern && value.contains('*')) {
            return Err(AtomError::InvalidValue {
                key: atom.key.clone(),
                value: value.clone(),
            });
        }
    }

    let key = atom.key.as_str();
    let first = atom.values.first().cloned().unwrap_or_default();
    let scoped = |q: Query| match spec.nested {
        Some(path) => Query::nested(path, q),
        None => q,
    };

    Ok(match atom.op {
        Operator::Cmp(Comparator::Eq) => scoped(Query::term(key, first)),
        Operator::Cmp(Comparator::Ne) => Query::none_of(vec![scoped(Query::term(key, first))]),
        Operator::Cmp(c) => {
            let range = RangeQuery::new(key);
            scoped(Query::Range(match c {
                Comparator::Gt => range.gt(first),
                Comparator::Ge => range.gte(first),
                Comparator::Lt => range.lt(first),
                _ => range.lte(first),
            }))
        }
        Operator::In => scoped(set_query(key, &atom.values)),
        Operator::NotIn => Query::none_of(vec![scoped(set_query(key, &atom.values))]),
    })
}

fn set_query(key: &str, values: &[String]) -> Query {
    Query::any_of(values.iter().map(|v| Query::wildcard(key, v.as_str())).collect())
}

/// Parse, validate and lower a selector.
///
/// Returns `Ok(None)` for a blank selector. All failures are
/// [`Error::InvalidSelector`].
pub fn selector_query(selector: &str, fields: &FieldSet) -> Result<Option<Query>> {
    if selector.len() > MAX_SELECTOR_LEN {
        return Err(Error::invalid_selector(
            truncate(selector),
            SelectorErrorKind::TooLong,
            format!("selector longer than {MAX_SELECTOR_LEN} bytes"),
        ));
    }
    let expr = parse(selector).map_err(|e: ParseError| {
        Error::invalid_selector(selector, SelectorErrorKind::Syntax, e.to_string())
    })?;
    match expr {
        None => Ok(None),
        Some(expr) => translate(&expr, fields)
            .map(Some)
            .map_err(|e| Error::invalid_selector(selector, e.kind(), e.to_string())),
    }
}

fn truncate(selector: &str) -> String {
    let mut end = 64.min(selector.len());
    while !selector.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &selector[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldSpec, ValueKind};
    use serde_json::json;

    fn fields() -> FieldSet {
        FieldSet::new(&[
            ("source_type", FieldSpec::new(ValueKind::OneOf(&["wep", "hep", "ns", "net"]))),
            ("source_name_aggr", FieldSpec::new(ValueKind::Keyword)),
            ("dest_port", FieldSpec::new(ValueKind::Integer)),
            ("count", FieldSpec::new(ValueKind::Integer)),
            ("source_ip", FieldSpec::new(ValueKind::Ip)),
            ("policies.all_policies", FieldSpec::nested(ValueKind::Keyword, "policies")),
        ])
    }

    fn lower(selector: &str) -> serde_json::Value {
        selector_query(selector, &fields()).unwrap().unwrap().to_json()
    }

    #[test]
    fn test_equality_stringifies_values() {
        assert_eq!(lower("count = 5"), json!({"term": {"count": {"value": "5"}}}));
    }

    #[test]
    fn test_and_or_not() {
        assert_eq!(
            lower("source_type = wep AND (dest_port > 80 OR NOT source_name_aggr = nginx)"),
            json!({"bool": {"must": [
                {"term": {"source_type": {"value": "wep"}}},
                {"bool": {"should": [
                    {"range": {"dest_port": {"gt": "80"}}},
                    {"bool": {"must_not": [{"term": {"source_name_aggr": {"value": "nginx"}}}]}}
                ]}}
            ]}})
        );
    }

    #[test]
    fn test_in_uses_wildcards() {
        assert_eq!(
            lower("source_name_aggr IN {'nginx-*', redis}"),
            json!({"bool": {"should": [
                {"wildcard": {"source_name_aggr": {"value": "nginx-*"}}},
                {"wildcard": {"source_name_aggr": {"value": "redis"}}}
            ]}})
        );
        assert_eq!(
            lower("source_name_aggr NOT IN {redis}"),
            json!({"bool": {"must_not": [{"bool": {"should": [
                {"wildcard": {"source_name_aggr": {"value": "redis"}}}
            ]}}]}})
        );
    }

    #[test]
    fn test_nested_keys_are_scoped() {
        assert_eq!(
            lower("'policies.all_policies' = 'default|allow-all|allow'"),
            json!({"nested": {"path": "policies", "query":
                {"term": {"policies.all_policies": {"value": "default|allow-all|allow"}}}}})
        );
    }

    #[test]
    fn test_invalid_key() {
        let err = selector_query("bogus = 1", &fields()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid selector (bogus = 1) in request: invalid key: bogus"
        );
        assert!(matches!(
            err,
            Error::InvalidSelector { kind: SelectorErrorKind::InvalidKey, .. }
        ));
    }

    #[test]
    fn test_invalid_value() {
        let err = selector_query("source_type = pod", &fields()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid selector (source_type = pod) in request: invalid value for source_type: pod"
        );
        let err = selector_query("source_ip = banana", &fields()).unwrap_err();
        assert!(err.to_string().contains("invalid value for source_ip: banana"));
    }

    #[test]
    fn test_syntax_error() {
        let err = selector_query("source_type = ", &fields()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSelector { kind: SelectorErrorKind::Syntax, .. }
        ));
        assert!(err.is_validation());
    }

    #[test]
    fn test_blank_selector_is_no_clause() {
        assert!(selector_query("", &fields()).unwrap().is_none());
    }

    #[test]
    fn test_too_long() {
        let long = "source_type = wep OR ".repeat(MAX_SELECTOR_LEN / 10);
        let err = selector_query(&long, &fields()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSelector { kind: SelectorErrorKind::TooLong, .. }
        ));
    }

    #[test]
    fn test_many_negations_accepted() {
        let clauses: Vec<String> = (0..500)
            .map(|i| format!("NOT source_name_aggr = \"name-{i}\""))
            .collect();
        let selector = clauses.join(" AND ");
        let q = selector_query(&selector, &fields()).unwrap().unwrap();
        match q {
            Query::Bool(b) => assert_eq!(b.must.len(), 500),
            other => panic!("unexpected query {other:?}"),
        }
    }
}
