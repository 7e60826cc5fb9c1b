//! Composite aggregation engine
//!
//! Groups documents by an ordered tuple of source fields and computes
//! metrics per group. One page of groups is one size-0 search; the engine's
//! composite `after_key` is handed back to the caller as the [`AfterKey`]
//! of the next page.
//!
//! ```text
//! CompositeAggregationQuery ──► search (size 0) ──► raw buckets
//!                                                       │ convert_bucket
//!                                                       ▼
//!                              caller type ◄── CompositeAggregationBucket
//! ```
//!
//! Buckets whose configured metrics are all zero carry no information and
//! are dropped before conversion.

use serde_json::{Map, Value};
use siftlog_core::{AfterKey, Error, Result};
use siftlog_engine::{DocumentEngine, SearchRequest};
use siftlog_query::{Aggregation, CompositeSource, Query, SortOrder, SubAggregations};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info};

/// Buckets per page when the query does not say otherwise
pub const DEFAULT_MAX_BUCKETS: usize = 1000;

/// Value the engine reports for a source that was not set
pub const UNSET_VALUE: &str = "-";

// ============================================================================
// Query
// ============================================================================

/// A metric computed over one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricInfo {
    pub name: String,
    pub field: String,
}

impl MetricInfo {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        MetricInfo {
            name: name.into(),
            field: field.into(),
        }
    }
}

/// A mean, optionally weighted by a second field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeanInfo {
    pub name: String,
    pub field: String,
    pub weight_field: Option<String>,
}

impl MeanInfo {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        MeanInfo {
            name: name.into(),
            field: field.into(),
            weight_field: None,
        }
    }

    pub fn weighted_by(mut self, weight_field: impl Into<String>) -> Self {
        self.weight_field = Some(weight_field.into());
        self
    }
}

/// Term counts over a field of a nested object array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedTermInfo {
    /// Name of the nested aggregation
    pub name: String,
    /// Path of the nested object array
    pub path: String,
    /// Name of the terms aggregation inside it
    pub term: String,
    pub field: String,
}

/// Description of one composite aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeAggregationQuery {
    /// Read pattern
    pub index: String,
    pub query: Query,
    /// Name of the composite aggregation in the request
    pub name: String,
    /// Group-by dimensions, in key order
    pub sources: Vec<CompositeSource>,
    pub sums: Vec<MetricInfo>,
    pub maxs: Vec<MetricInfo>,
    pub mins: Vec<MetricInfo>,
    pub means: Vec<MeanInfo>,
    pub terms: Vec<MetricInfo>,
    pub nested_terms: Vec<NestedTermInfo>,
    /// Buckets per page; 0 selects [`DEFAULT_MAX_BUCKETS`]
    pub max_buckets_per_query: usize,
}

impl CompositeAggregationQuery {
    pub fn new(
        index: impl Into<String>,
        query: Query,
        name: impl Into<String>,
        sources: Vec<CompositeSource>,
    ) -> Self {
        CompositeAggregationQuery {
            index: index.into(),
            query,
            name: name.into(),
            sources,
            sums: Vec::new(),
            maxs: Vec::new(),
            mins: Vec::new(),
            means: Vec::new(),
            terms: Vec::new(),
            nested_terms: Vec::new(),
            max_buckets_per_query: 0,
        }
    }

    pub fn with_sums(mut self, sums: Vec<MetricInfo>) -> Self {
        self.sums = sums;
        self
    }

    pub fn with_maxs(mut self, maxs: Vec<MetricInfo>) -> Self {
        self.maxs = maxs;
        self
    }

    pub fn with_mins(mut self, mins: Vec<MetricInfo>) -> Self {
        self.mins = mins;
        self
    }

    pub fn with_means(mut self, means: Vec<MeanInfo>) -> Self {
        self.means = means;
        self
    }

    pub fn with_terms(mut self, terms: Vec<MetricInfo>) -> Self {
        self.terms = terms;
        self
    }

    pub fn with_nested_terms(mut self, nested_terms: Vec<NestedTermInfo>) -> Self {
        self.nested_terms = nested_terms;
        self
    }

    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets_per_query = max_buckets;
        self
    }

    /// Effective page size in buckets
    pub fn max_buckets(&self) -> usize {
        if self.max_buckets_per_query > 0 {
            self.max_buckets_per_query
        } else {
            DEFAULT_MAX_BUCKETS
        }
    }

    fn has_metrics(&self) -> bool {
        !(self.sums.is_empty()
            && self.maxs.is_empty()
            && self.mins.is_empty()
            && self.means.is_empty())
    }

    /// The composite aggregation, resuming after `after` when given
    pub fn aggregation(&self, after: Option<Map<String, Value>>) -> Aggregation {
        let mut aggs = SubAggregations::new();
        for s in &self.sums {
            aggs.insert(s.name.clone(), Aggregation::Sum { field: s.field.clone() });
        }
        for m in &self.maxs {
            aggs.insert(m.name.clone(), Aggregation::Max { field: m.field.clone() });
        }
        for m in &self.mins {
            aggs.insert(m.name.clone(), Aggregation::Min { field: m.field.clone() });
        }
        for m in &self.means {
            let agg = match &m.weight_field {
                Some(weight) => Aggregation::WeightedAvg {
                    value_field: m.field.clone(),
                    weight_field: weight.clone(),
                },
                None => Aggregation::Avg { field: m.field.clone() },
            };
            aggs.insert(m.name.clone(), agg);
        }
        for n in &self.nested_terms {
            let mut inner = SubAggregations::new();
            inner.insert(
                n.term.clone(),
                Aggregation::Terms {
                    field: n.field.clone(),
                    size: self.max_buckets(),
                    aggs: SubAggregations::new(),
                },
            );
            aggs.insert(
                n.name.clone(),
                Aggregation::Nested {
                    path: n.path.clone(),
                    aggs: inner,
                },
            );
        }
        for t in &self.terms {
            aggs.insert(
                t.name.clone(),
                Aggregation::Terms {
                    field: t.field.clone(),
                    size: self.max_buckets(),
                    aggs: SubAggregations::new(),
                },
            );
        }
        Aggregation::Composite {
            size: self.max_buckets(),
            sources: self.sources.clone(),
            after,
            aggs,
        }
    }

    /// Convert one raw bucket of the engine response.
    ///
    /// # Errors
    ///
    /// Fails when a source is missing from the bucket key.
    pub fn convert_bucket(&self, raw: &Value) -> Result<CompositeAggregationBucket> {
        let doc_count = raw.get("doc_count").and_then(Value::as_i64).unwrap_or(0);
        let mut bucket = CompositeAggregationBucket::new(doc_count);

        let key = raw.get("key").and_then(Value::as_object);
        for source in &self.sources {
            let Some(value) = key.and_then(|k| k.get(&source.name)) else {
                error!(source = %source.name, "composite bucket key is incomplete");
                return Err(Error::upstream(
                    "composite aggregation",
                    format!(
                        "error fetching composite results: {} missing from response",
                        source.name
                    ),
                ));
            };
            bucket.key.push(CompositeAggregationSourceValue {
                name: source.name.clone(),
                value: value.clone(),
            });
        }

        let metric = |name: &str| {
            raw.get(name)
                .and_then(|m| m.get("value"))
                .and_then(Value::as_f64)
        };
        for (infos, target) in [
            (&self.sums, &mut bucket.sums),
            (&self.maxs, &mut bucket.maxs),
            (&self.mins, &mut bucket.mins),
        ] {
            for info in infos {
                match metric(&info.name) {
                    Some(v) => {
                        target.insert(info.name.clone(), v);
                    }
                    None => debug!(metric = %info.name, "metric missing from bucket"),
                }
            }
        }
        for info in &self.means {
            match metric(&info.name) {
                Some(v) => {
                    bucket.means.insert(info.name.clone(), v);
                }
                None => debug!(metric = %info.name, "mean missing from bucket"),
            }
        }

        for info in &self.nested_terms {
            let Some(nested) = raw.get(&info.name) else {
                debug!(aggregation = %info.name, "nested terms missing from bucket");
                continue;
            };
            let Some(buckets) = nested.get(&info.term).and_then(|t| t.get("buckets")) else {
                debug!(
                    aggregation = %info.name,
                    term = %info.term,
                    "terms missing from nested aggregation"
                );
                continue;
            };
            let doc_count = nested.get("doc_count").and_then(Value::as_i64).unwrap_or(0);
            bucket.terms.insert(
                info.name.clone(),
                AggregatedTerm::from_buckets(doc_count, buckets),
            );
        }
        for info in &self.terms {
            let Some(buckets) = raw.get(&info.name).and_then(|t| t.get("buckets")) else {
                debug!(aggregation = %info.name, "terms missing from bucket");
                continue;
            };
            let count = buckets.as_array().map(|b| b.len() as i64).unwrap_or(0);
            bucket.terms.insert(info.name.clone(), AggregatedTerm::from_buckets(count, buckets));
        }
        Ok(bucket)
    }

    fn all_metrics_zero(&self, bucket: &CompositeAggregationBucket) -> bool {
        let zero = |map: &HashMap<String, f64>, name: &str| {
            map.get(name).copied().unwrap_or(0.0) == 0.0
        };
        self.sums.iter().all(|m| zero(&bucket.sums, &m.name))
            && self.maxs.iter().all(|m| zero(&bucket.maxs, &m.name))
            && self.mins.iter().all(|m| zero(&bucket.mins, &m.name))
            && self.means.iter().all(|m| zero(&bucket.means, &m.name))
    }
}

// ============================================================================
// Buckets
// ============================================================================

/// One source value of a bucket key
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeAggregationSourceValue {
    pub name: String,
    pub value: Value,
}

/// Ordered source values identifying a bucket
pub type CompositeAggregationKey = Vec<CompositeAggregationSourceValue>;

/// Term counts of one terms aggregation inside a bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedTerm {
    pub doc_count: i64,
    /// Term → documents carrying it
    pub buckets: BTreeMap<String, i64>,
}

impl AggregatedTerm {
    fn from_buckets(doc_count: i64, raw: &Value) -> Self {
        let mut term = AggregatedTerm {
            doc_count,
            buckets: BTreeMap::new(),
        };
        for b in raw.as_array().into_iter().flatten() {
            let key = match b.get("key") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => continue,
                Some(other) => other.to_string(),
            };
            let count = b.get("doc_count").and_then(Value::as_i64).unwrap_or(0);
            term.buckets.insert(key, count);
        }
        term
    }
}

/// One group of a composite aggregation with its metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeAggregationBucket {
    pub doc_count: i64,
    pub key: CompositeAggregationKey,
    pub terms: HashMap<String, AggregatedTerm>,
    pub sums: HashMap<String, f64>,
    pub maxs: HashMap<String, f64>,
    pub mins: HashMap<String, f64>,
    pub means: HashMap<String, f64>,
}

impl CompositeAggregationBucket {
    pub fn new(doc_count: i64) -> Self {
        CompositeAggregationBucket {
            doc_count,
            ..Default::default()
        }
    }

    pub fn sum(&self, name: &str) -> f64 {
        self.sums.get(name).copied().unwrap_or(0.0)
    }

    pub fn max(&self, name: &str) -> f64 {
        self.maxs.get(name).copied().unwrap_or(0.0)
    }

    pub fn min(&self, name: &str) -> f64 {
        self.mins.get(name).copied().unwrap_or(0.0)
    }

    pub fn mean(&self, name: &str) -> f64 {
        self.means.get(name).copied().unwrap_or(0.0)
    }
}

// ============================================================================
// Key access
// ============================================================================

/// Looks up bucket key values by source name
#[derive(Debug, Clone, Default)]
pub struct FieldTracker {
    positions: HashMap<String, usize>,
}

impl FieldTracker {
    pub fn new(sources: &[CompositeSource]) -> Self {
        FieldTracker {
            positions: sources
                .iter()
                .enumerate()
                .map(|(i, s)| (s.name.clone(), i))
                .collect(),
        }
    }

    /// Position of `name` in the key
    pub fn index(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    fn value<'k>(&self, key: &'k CompositeAggregationKey, name: &str) -> Option<&'k Value> {
        self.index(name).and_then(|i| key.get(i)).map(|v| &v.value)
    }

    /// String form of a key value; unset and `-` values read as empty
    pub fn value_string(&self, key: &CompositeAggregationKey, name: &str) -> String {
        match self.value(key, name) {
            Some(Value::String(s)) if s == UNSET_VALUE => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    /// Integer form of a key value; 0 when unset or not numeric
    pub fn value_i64(&self, key: &CompositeAggregationKey, name: &str) -> i64 {
        match self.value(key, name) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn value_i32(&self, key: &CompositeAggregationKey, name: &str) -> i32 {
        i32::try_from(self.value_i64(key, name)).unwrap_or(0)
    }
}

// ============================================================================
// Paging
// ============================================================================

/// Fetch one page of buckets and convert them with `convert`.
///
/// Returns the converted page and the cursor of the next one, `None` when
/// this was the last page.
pub async fn paged_search<T, F>(
    engine: &dyn DocumentEngine,
    query: &CompositeAggregationQuery,
    after: Option<&AfterKey>,
    mut convert: F,
) -> Result<(Vec<T>, Option<AfterKey>)>
where
    F: FnMut(&CompositeAggregationBucket) -> Option<T>,
{
    let resume = after.filter(|k| !k.is_empty()).map(|k| k.as_map().clone());
    if let Some(key) = &resume {
        debug!(after = ?key, "enumerating after key");
    }
    let request = SearchRequest::new(query.index.as_str(), query.query.clone())
        .size(0)
        .aggregation(query.name.as_str(), query.aggregation(resume));

    debug!(index = %query.index, "performing composite aggregation");
    let resp = engine
        .search(request)
        .await
        .map_err(|e| e.context(format!("failed to search {}", query.index)))?;
    if resp.timed_out {
        error!(index = %query.index, "composite aggregation timed out");
        return Err(Error::upstream(
            "composite aggregation",
            format!("timed out querying {}", query.index),
        ));
    }

    let Some(results) = resp.aggregations.get(&query.name) else {
        info!(index = %query.index, "no results for composite query");
        return Ok((Vec::new(), None));
    };
    let raw_buckets = results
        .get("buckets")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut page = Vec::with_capacity(raw_buckets.len());
    for raw in raw_buckets {
        let bucket = query.convert_bucket(raw)?;
        if query.has_metrics() && query.all_metrics_zero(&bucket) {
            debug!(doc_count = bucket.doc_count, "dropping bucket with all-zero metrics");
            continue;
        }
        if let Some(item) = convert(&bucket) {
            page.push(item);
        }
    }

    let after_key = results.get("after_key").and_then(Value::as_object);
    let next = match after_key {
        Some(key) if raw_buckets.len() >= query.max_buckets() && !key.is_empty() => {
            Some(AfterKey::from_map(key.clone()))
        }
        _ => {
            debug!(index = %query.index, "completed composite enumeration");
            None
        }
    };
    Ok((page, next))
}

/// Source sorted ascending, no missing bucket
pub fn source(name: &str, field: &str) -> CompositeSource {
    CompositeSource {
        name: name.to_string(),
        field: field.to_string(),
        order: SortOrder::Asc,
        missing_bucket: false,
    }
}
