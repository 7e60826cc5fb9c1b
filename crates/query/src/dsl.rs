//! Query tree in the document engine's native shape
//!
//! [`Query`] serializes to the engine's JSON query DSL. The same tree is
//! evaluated directly by the in-process engine, so there is exactly one
//! representation of a filter from builder to execution.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

// ============================================================================
// Query
// ============================================================================

/// A node of the query tree
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Matches every document
    MatchAll,
    /// Exact match on a field
    Term {
        /// Field name
        field: String,
        /// Value to match
        value: Value,
    },
    /// Exact match against any of several values
    Terms {
        /// Field name
        field: String,
        /// Accepted values
        values: Vec<Value>,
    },
    /// Glob match (`*` and `?`) on a keyword field
    Wildcard {
        /// Field name
        field: String,
        /// Pattern
        value: String,
    },
    /// Bounded range on a field
    Range(RangeQuery),
    /// Field is present and non-null
    Exists {
        /// Field name
        field: String,
    },
    /// Document ID is one of the given values
    Ids {
        /// Accepted IDs
        values: Vec<String>,
    },
    /// Scope the inner query to the elements of a nested array
    Nested {
        /// Path of the nested objects
        path: String,
        /// Query each nested object must satisfy
        query: Box<Query>,
    },
    /// Boolean combination
    Bool(BoolQuery),
}

/// Range bounds on a field. Any bound may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeQuery {
    pub field: String,
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl RangeQuery {
    /// Empty range on `field`
    pub fn new(field: impl Into<String>) -> Self {
        RangeQuery {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn gt(mut self, v: impl Into<Value>) -> Self {
        self.gt = Some(v.into());
        self
    }

    pub fn gte(mut self, v: impl Into<Value>) -> Self {
        self.gte = Some(v.into());
        self
    }

    pub fn lt(mut self, v: impl Into<Value>) -> Self {
        self.lt = Some(v.into());
        self
    }

    pub fn lte(mut self, v: impl Into<Value>) -> Self {
        self.lte = Some(v.into());
        self
    }
}

/// Boolean query.
///
/// `should` clauses are required (at least one) only when the query has no
/// `must` or `filter` clause, unless `minimum_should_match` says otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub filter: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub minimum_should_match: Option<u32>,
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery::default()
    }

    pub fn must(mut self, q: Query) -> Self {
        self.must.push(q);
        self
    }

    pub fn filter(mut self, q: Query) -> Self {
        self.filter.push(q);
        self
    }

    pub fn should(mut self, q: Query) -> Self {
        self.should.push(q);
        self
    }

    pub fn must_not(mut self, q: Query) -> Self {
        self.must_not.push(q);
        self
    }

    /// Number of `should` clauses that must match
    pub fn effective_minimum_should_match(&self) -> u32 {
        match self.minimum_should_match {
            Some(n) => n,
            None if self.should.is_empty() => 0,
            None if self.must.is_empty() && self.filter.is_empty() => 1,
            None => 0,
        }
    }
}

impl Query {
    /// `{"term": {field: {"value": value}}}`
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `{"terms": {field: [values]}}`
    pub fn terms<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Query::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn wildcard(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Wildcard {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Query::Exists {
            field: field.into(),
        }
    }

    pub fn ids<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Query::Ids {
            values: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn nested(path: impl Into<String>, query: Query) -> Self {
        Query::Nested {
            path: path.into(),
            query: Box::new(query),
        }
    }

    /// Every clause must match
    pub fn all_of(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            must: clauses,
            ..Default::default()
        })
    }

    /// At least one clause must match
    pub fn any_of(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            should: clauses,
            ..Default::default()
        })
    }

    /// No clause may match
    pub fn none_of(clauses: Vec<Query>) -> Self {
        Query::Bool(BoolQuery {
            must_not: clauses,
            ..Default::default()
        })
    }

    /// Render as engine JSON
    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({"match_all": {}}),
            Query::Term { field, value } => json!({"term": {field.as_str(): {"value": value}}}),
            Query::Terms { field, values } => json!({"terms": {field.as_str(): values}}),
            Query::Wildcard { field, value } => {
                json!({"wildcard": {field.as_str(): {"value": value}}})
            }
            Query::Range(r) => {
                let mut bounds = Map::new();
                let named = [("gt", &r.gt), ("gte", &r.gte), ("lt", &r.lt), ("lte", &r.lte)];
                for (name, bound) in named {
                    if let Some(v) = bound {
                        bounds.insert(name.to_string(), v.clone());
                    }
                }
                json!({"range": {r.field.as_str(): bounds}})
            }
            Query::Exists { field } => json!({"exists": {"field": field}}),
            Query::Ids { values } => json!({"ids": {"values": values}}),
            Query::Nested { path, query } => {
                json!({"nested": {"path": path, "query": query.to_json()}})
            }
            Query::Bool(b) => {
                let mut body = Map::new();
                for (name, clauses) in [
                    ("must", &b.must),
                    ("filter", &b.filter),
                    ("should", &b.should),
                    ("must_not", &b.must_not),
                ] {
                    if !clauses.is_empty() {
                        body.insert(
                            name.to_string(),
                            Value::Array(clauses.iter().map(Query::to_json).collect()),
                        );
                    }
                }
                if let Some(n) = b.minimum_should_match {
                    body.insert("minimum_should_match".to_string(), json!(n));
                }
                json!({"bool": body})
            }
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ============================================================================
// Sort
// ============================================================================

/// One sort key of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub descending: bool,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        SortField {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortField {
            field: field.into(),
            descending: true,
        }
    }

    /// `{field: {"order": "asc"|"desc"}}`
    pub fn to_json(&self) -> Value {
        let order = if self.descending { "desc" } else { "asc" };
        json!({self.field.as_str(): {"order": order}})
    }
}

impl Serialize for SortField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
