//! Requests and responses exchanged with a document engine

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use siftlog_query::aggregation::{aggs_to_json, SubAggregations};
use siftlog_query::{Query, SortField};

// ============================================================================
// Bulk
// ============================================================================

/// When written documents become visible to searches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Visible after the next periodic refresh
    #[default]
    None,
    /// The call returns once the write is visible
    WaitFor,
}

impl RefreshPolicy {
    /// Value of the `refresh` URL parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            RefreshPolicy::None => "false",
            RefreshPolicy::WaitFor => "wait_for",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Index,
    Update,
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Index => "index",
            BulkAction::Update => "update",
            BulkAction::Delete => "delete",
        }
    }
}

/// One operation of a bulk request
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    pub action: BulkAction,
    /// Index or write alias
    pub index: String,
    /// Document ID; the engine assigns one for index when absent
    pub id: Option<String>,
    /// Document (index) or partial document (update)
    pub doc: Option<Value>,
}

impl BulkOperation {
    pub fn index(index: impl Into<String>, id: Option<String>, doc: Value) -> Self {
        BulkOperation {
            action: BulkAction::Index,
            index: index.into(),
            id,
            doc: Some(doc),
        }
    }

    pub fn update(index: impl Into<String>, id: impl Into<String>, partial: Value) -> Self {
        BulkOperation {
            action: BulkAction::Update,
            index: index.into(),
            id: Some(id.into()),
            doc: Some(partial),
        }
    }

    pub fn delete(index: impl Into<String>, id: impl Into<String>) -> Self {
        BulkOperation {
            action: BulkAction::Delete,
            index: index.into(),
            id: Some(id.into()),
            doc: None,
        }
    }

    /// Action line of the NDJSON body
    pub fn action_line(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("_index".to_string(), Value::from(self.index.as_str()));
        if let Some(id) = &self.id {
            meta.insert("_id".to_string(), Value::from(id.as_str()));
        }
        json!({self.action.as_str(): meta})
    }

    /// Document line of the NDJSON body, if the action has one
    pub fn source_line(&self) -> Option<Value> {
        match (self.action, &self.doc) {
            (BulkAction::Delete, _) | (_, None) => None,
            (BulkAction::Update, Some(doc)) => Some(json!({"doc": doc})),
            (_, Some(doc)) => Some(doc.clone()),
        }
    }
}

/// A batch of write operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkRequest {
    pub operations: Vec<BulkOperation>,
    pub refresh: RefreshPolicy,
}

impl BulkRequest {
    pub fn new(operations: Vec<BulkOperation>) -> Self {
        BulkRequest {
            operations,
            refresh: RefreshPolicy::None,
        }
    }

    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    /// NDJSON body: action line, then the document line when there is one
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut body = String::new();
        for op in &self.operations {
            body.push_str(&serde_json::to_string(&op.action_line())?);
            body.push('\n');
            if let Some(source) = op.source_line() {
                body.push_str(&serde_json::to_string(&source)?);
                body.push('\n');
            }
        }
        Ok(body)
    }
}

/// Engine-reported cause of an item failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCause {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
}

/// Outcome of one bulk operation, in request order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemResult {
    pub action: BulkAction,
    pub index: String,
    pub id: String,
    pub status: u16,
    pub error: Option<ErrorCause>,
}

impl BulkItemResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

/// Outcome of a bulk request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResult {
    pub errors: bool,
    pub items: Vec<BulkItemResult>,
}

// ============================================================================
// Index management
// ============================================================================

/// Settings and mappings applied to every index matching `patterns`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTemplate {
    pub name: String,
    pub patterns: Vec<String>,
    pub settings: Value,
    pub mappings: Value,
}

impl IndexTemplate {
    pub fn to_body(&self) -> Value {
        json!({
            "index_patterns": self.patterns,
            "template": {
                "settings": self.settings,
                "mappings": self.mappings,
            }
        })
    }
}

/// Creation of a concrete index, optionally as the write index of an alias
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    pub name: String,
    pub write_alias: Option<String>,
}

impl CreateIndex {
    pub fn to_body(&self) -> Value {
        match &self.write_alias {
            Some(alias) => json!({"aliases": {alias.as_str(): {"is_write_index": true}}}),
            None => json!({}),
        }
    }
}

// ============================================================================
// Search
// ============================================================================

/// Point in time a search runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointInTime {
    pub id: String,
    pub keep_alive: String,
}

/// One search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Index expression; ignored when `pit` is set
    pub index: String,
    pub query: Query,
    pub size: usize,
    pub from: Option<usize>,
    pub sort: Vec<SortField>,
    pub search_after: Option<Vec<Value>>,
    pub pit: Option<PointInTime>,
    pub aggregations: SubAggregations,
}

impl SearchRequest {
    pub fn new(index: impl Into<String>, query: Query) -> Self {
        SearchRequest {
            index: index.into(),
            query,
            size: 10,
            from: None,
            sort: Vec::new(),
            search_after: None,
            pit: None,
            aggregations: SubAggregations::new(),
        }
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn offset(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }

    pub fn sort(mut self, sort: Vec<SortField>) -> Self {
        self.sort = sort;
        self
    }

    pub fn search_after(mut self, values: Vec<Value>) -> Self {
        self.search_after = Some(values);
        self
    }

    pub fn point_in_time(mut self, pit: PointInTime) -> Self {
        self.pit = Some(pit);
        self
    }

    pub fn aggregation(mut self, name: impl Into<String>, agg: siftlog_query::Aggregation) -> Self {
        self.aggregations.insert(name.into(), agg);
        self
    }

    /// Request body in the engine's JSON format
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query.to_json());
        body.insert("size".to_string(), json!(self.size));
        body.insert("track_total_hits".to_string(), json!(true));
        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }
        if !self.sort.is_empty() {
            body.insert(
                "sort".to_string(),
                Value::Array(self.sort.iter().map(SortField::to_json).collect()),
            );
        }
        if let Some(after) = &self.search_after {
            body.insert("search_after".to_string(), Value::Array(after.clone()));
        }
        if let Some(pit) = &self.pit {
            body.insert(
                "pit".to_string(),
                json!({"id": pit.id, "keep_alive": pit.keep_alive}),
            );
        }
        if !self.aggregations.is_empty() {
            body.insert("aggs".to_string(), aggs_to_json(&self.aggregations));
        }
        Value::Object(body)
    }
}

/// One matching document
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub index: String,
    pub id: String,
    pub source: Value,
    /// Sort values, including the engine's tie-breaker under a point in time
    pub sort: Vec<Value>,
}

/// Result of a search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub timed_out: bool,
    pub total_hits: i64,
    pub hits: Vec<Hit>,
    pub aggregations: Map<String, Value>,
    /// Refreshed point-in-time ID, when the search used one
    pub pit_id: Option<String>,
}

// ============================================================================
// Wire decoding
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchResponse {
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub hits: RawHits,
    #[serde(default)]
    pub aggregations: Map<String, Value>,
    #[serde(default)]
    pub pit_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawHits {
    #[serde(default)]
    pub total: Option<RawTotal>,
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawTotal {
    Object { value: i64 },
    Number(i64),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawHit {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source", default)]
    pub source: Value,
    #[serde(default)]
    pub sort: Vec<Value>,
}

impl From<RawSearchResponse> for SearchResponse {
    fn from(raw: RawSearchResponse) -> Self {
        let total_hits = match raw.hits.total {
            Some(RawTotal::Object { value }) | Some(RawTotal::Number(value)) => value,
            None => raw.hits.hits.len() as i64,
        };
        SearchResponse {
            timed_out: raw.timed_out,
            total_hits,
            hits: raw
                .hits
                .hits
                .into_iter()
                .map(|h| Hit {
                    index: h.index,
                    id: h.id,
                    source: h.source,
                    sort: h.sort,
                })
                .collect(),
            aggregations: raw.aggregations,
            pit_id: raw.pit_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBulkResponse {
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBulkItem {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub error: Option<ErrorCause>,
}
