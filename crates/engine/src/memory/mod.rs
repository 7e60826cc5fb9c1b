//! In-process document engine
//!
//! Implements the subset of engine behavior the backend relies on:
//! - indices, write aliases and index templates with typed mappings
//! - bulk writes with per-item failures (mapping errors, missing documents)
//! - search over the full query tree, sorting with a sequence tie-breaker,
//!   `from`/`size` bounded by `max_result_window`, `search_after`
//! - point-in-time snapshots with keep-alive expiry
//! - terms, metric, nested and composite aggregations
//!
//! Writes are visible immediately, whatever the bulk refresh policy.
//!
//! # Example
//!
//! ```ignore
//! let engine = MemoryEngine::new().with_max_result_window(100);
//! engine
//!     .create_index(CreateIndex {
//!         name: "logs.000001".into(),
//!         write_alias: Some("logs".into()),
//!     })
//!     .await?;
//! ```

mod aggs;
mod eval;
mod mapping;

use crate::client::DocumentEngine;
use crate::error::{EngineError, Result};
use crate::types::{
    BulkAction, BulkItemResult, BulkOperation, BulkRequest, BulkResult, CreateIndex, ErrorCause,
    Hit, IndexTemplate, SearchRequest, SearchResponse,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use eval::glob_match;

/// Default bound on `from + size`
pub const DEFAULT_MAX_RESULT_WINDOW: usize = 10_000;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone)]
struct Document {
    seq: u64,
    source: Value,
}

#[derive(Debug, Default)]
struct Index {
    mappings: Value,
    docs: BTreeMap<String, Document>,
}

#[derive(Debug, Default)]
struct Alias {
    indices: BTreeSet<String>,
    write_index: Option<String>,
}

/// Document as seen by one search
#[derive(Debug, Clone)]
struct Stored {
    index: String,
    id: String,
    seq: u64,
    source: Value,
}

#[derive(Debug)]
struct PitSnapshot {
    docs: Vec<Stored>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    indices: BTreeMap<String, Index>,
    aliases: BTreeMap<String, Alias>,
    templates: BTreeMap<String, IndexTemplate>,
    pits: HashMap<String, PitSnapshot>,
    seq: u64,
}

impl State {
    /// Concrete indices named by a comma-separated expression. Unknown
    /// names are skipped.
    fn resolve(&self, expression: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for part in expression.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part.contains('*') {
                out.extend(self.indices.keys().filter(|n| glob_match(part, n)).cloned());
                for (name, alias) in &self.aliases {
                    if glob_match(part, name) {
                        out.extend(alias.indices.iter().cloned());
                    }
                }
            } else if self.indices.contains_key(part) {
                out.insert(part.to_string());
            } else if let Some(alias) = self.aliases.get(part) {
                out.extend(alias.indices.iter().cloned());
            }
        }
        out
    }

    fn documents(&self, indices: &BTreeSet<String>) -> Vec<Stored> {
        let mut docs = Vec::new();
        for name in indices {
            if let Some(index) = self.indices.get(name) {
                docs.extend(index.docs.iter().map(|(id, doc)| Stored {
                    index: name.clone(),
                    id: id.clone(),
                    seq: doc.seq,
                    source: doc.source.clone(),
                }));
            }
        }
        docs
    }

    /// Mappings of the most specific template matching `name`
    fn template_mappings(&self, name: &str) -> Value {
        self.templates
            .values()
            .filter_map(|t| {
                t.patterns
                    .iter()
                    .filter(|p| glob_match(p, name))
                    .map(|p| p.len())
                    .max()
                    .map(|specificity| (specificity, t))
            })
            .max_by_key(|(specificity, _)| *specificity)
            .map(|(_, t)| t.mappings.clone())
            .unwrap_or_else(|| json!({}))
    }

    fn create_index(&mut self, request: &CreateIndex) -> Result<()> {
        if self.indices.contains_key(&request.name) || self.aliases.contains_key(&request.name) {
            return Err(EngineError::AlreadyExists(request.name.clone()));
        }
        if let Some(alias) = &request.write_alias {
            if self.indices.contains_key(alias) {
                return Err(EngineError::Status {
                    status: 400,
                    kind: "invalid_alias_name_exception".to_string(),
                    reason: format!("an index exists with the same name as the alias [{alias}]"),
                });
            }
        }
        let mappings = self.template_mappings(&request.name);
        self.indices.insert(
            request.name.clone(),
            Index {
                mappings,
                docs: BTreeMap::new(),
            },
        );
        if let Some(alias) = &request.write_alias {
            let entry = self.aliases.entry(alias.clone()).or_default();
            entry.indices.insert(request.name.clone());
            entry.write_index = Some(request.name.clone());
        }
        Ok(())
    }

    /// Concrete index a write to `target` lands in
    fn write_target(&mut self, target: &str, auto_create: bool) -> ItemResult<String> {
        if self.indices.contains_key(target) {
            return Ok(target.to_string());
        }
        if let Some(alias) = self.aliases.get(target) {
            return match (&alias.write_index, alias.indices.len()) {
                (Some(write), _) => Ok(write.clone()),
                (None, 1) => Ok(alias.indices.iter().next().cloned().unwrap_or_default()),
                _ => Err(cause(
                    400,
                    "illegal_argument_exception",
                    format!("no write index is defined for alias [{target}]"),
                )),
            };
        }
        if !auto_create {
            return Err(cause(
                404,
                "index_not_found_exception",
                format!("no such index [{target}]"),
            ));
        }
        let request = CreateIndex {
            name: target.to_string(),
            write_alias: None,
        };
        self.create_index(&request)
            .map_err(|e| cause(400, "illegal_argument_exception", e.to_string()))?;
        Ok(target.to_string())
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn apply(&mut self, op: BulkOperation) -> BulkItemResult {
        let action = op.action;
        let auto_create = action == BulkAction::Index;
        let mut result = BulkItemResult {
            action,
            index: op.index.clone(),
            id: op.id.clone().unwrap_or_default(),
            status: 200,
            error: None,
        };
        let outcome = self
            .write_target(&op.index, auto_create)
            .and_then(|index| {
                result.index = index.clone();
                self.apply_to(&index, op)
            });
        match outcome {
            Ok((id, status)) => {
                result.id = id;
                result.status = status;
            }
            Err((status, error)) => {
                result.status = status;
                result.error = Some(error);
            }
        }
        result
    }

    fn apply_to(&mut self, index: &str, op: BulkOperation) -> ItemResult<(String, u16)> {
        let seq = self.next_seq();
        let Some(target) = self.indices.get_mut(index) else {
            return Err(cause(404, "index_not_found_exception", format!("no such index [{index}]")));
        };
        match op.action {
            BulkAction::Index => {
                let id = op.id.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
                let Some(source) = op.doc else {
                    return Err(cause(
                        400,
                        "action_request_validation_exception",
                        "source is missing".to_string(),
                    ));
                };
                mapping::validate(&target.mappings, &source)
                    .map_err(|reason| cause(400, "mapper_parsing_exception", reason))?;
                let status = match target.docs.insert(id.clone(), Document { seq, source }) {
                    Some(_) => 200,
                    None => 201,
                };
                Ok((id, status))
            }
            BulkAction::Update => {
                let id = op.id.unwrap_or_default();
                let Some(existing) = target.docs.get(&id) else {
                    return Err(cause(
                        404,
                        "document_missing_exception",
                        format!("[{id}]: document missing"),
                    ));
                };
                let mut merged = existing.source.clone();
                merge(&mut merged, op.doc.unwrap_or(Value::Null));
                mapping::validate(&target.mappings, &merged)
                    .map_err(|reason| cause(400, "mapper_parsing_exception", reason))?;
                target.docs.insert(id.clone(), Document { seq, source: merged });
                Ok((id, 200))
            }
            BulkAction::Delete => {
                let id = op.id.unwrap_or_default();
                match target.docs.remove(&id) {
                    Some(_) => Ok((id, 200)),
                    None => Err(cause(404, "not_found", format!("[{id}]: document not found"))),
                }
            }
        }
    }
}

/// Outcome of one bulk item: a value, or the status and cause it failed with
type ItemResult<T> = std::result::Result<T, (u16, ErrorCause)>;

fn cause(status: u16, kind: &str, reason: String) -> (u16, ErrorCause) {
    (
        status,
        ErrorCause {
            kind: kind.to_string(),
            reason,
        },
    )
}

/// Apply a partial document the way an update does: objects merge
/// recursively, everything else replaces.
fn merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (k, v) in p {
                match t.get_mut(&k) {
                    Some(existing) if existing.is_object() && v.is_object() => merge(existing, v),
                    _ => {
                        t.insert(k, v);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (t, p) => *t = p,
    }
}

/// Parse a keep-alive such as `30s`, `5m` or `1h`
fn parse_keep_alive(s: &str) -> Result<Duration> {
    let invalid = || EngineError::Status {
        status: 400,
        kind: "parse_exception".to_string(),
        reason: format!("failed to parse setting [keep_alive] with value [{s}]"),
    };
    let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
    let (number, unit) = s.split_at(split);
    let n: u64 = number.parse().map_err(|_| invalid())?;
    let secs = |per_unit: u64| n.checked_mul(per_unit).map(Duration::from_secs);
    let duration = match unit {
        "ms" => Some(Duration::from_millis(n)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(3600),
        "d" => secs(86_400),
        _ => None,
    };
    duration.ok_or_else(invalid)
}

/// Instant a point in time kept alive for `keep_alive` from `now` expires
fn expiry(now: Instant, keep_alive: &str) -> Result<Instant> {
    let duration = parse_keep_alive(keep_alive)?;
    now.checked_add(duration).ok_or_else(|| EngineError::Status {
        status: 400,
        kind: "parse_exception".to_string(),
        reason: format!("keep_alive [{keep_alive}] is too long"),
    })
}

// ============================================================================
// Engine
// ============================================================================

/// Document engine held entirely in memory
#[derive(Debug)]
pub struct MemoryEngine {
    state: RwLock<State>,
    max_result_window: usize,
    bulk_requests: AtomicU64,
    search_requests: AtomicU64,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        MemoryEngine {
            state: RwLock::new(State::default()),
            max_result_window: DEFAULT_MAX_RESULT_WINDOW,
            bulk_requests: AtomicU64::new(0),
            search_requests: AtomicU64::new(0),
        }
    }

    /// Bound `from + size` of a single search
    pub fn with_max_result_window(mut self, window: usize) -> Self {
        self.max_result_window = window;
        self
    }

    /// Number of points in time currently open
    pub fn open_pit_count(&self) -> usize {
        self.state.read().pits.len()
    }

    /// Number of documents across the indices named by `expression`
    pub fn document_count(&self, expression: &str) -> usize {
        let state = self.state.read();
        state
            .resolve(expression)
            .iter()
            .filter_map(|name| state.indices.get(name))
            .map(|index| index.docs.len())
            .sum()
    }

    /// Names of every concrete index
    pub fn index_names(&self) -> Vec<String> {
        self.state.read().indices.keys().cloned().collect()
    }

    /// Raw source of a stored document
    pub fn get_document(&self, index: &str, id: &str) -> Option<Value> {
        let state = self.state.read();
        state
            .resolve(index)
            .iter()
            .filter_map(|name| state.indices.get(name))
            .find_map(|i| i.docs.get(id).map(|d| d.source.clone()))
    }

    /// Bulk requests received so far
    pub fn bulk_request_count(&self) -> u64 {
        self.bulk_requests.load(AtomicOrdering::Relaxed)
    }

    /// Search requests received so far
    pub fn search_request_count(&self) -> u64 {
        self.search_requests.load(AtomicOrdering::Relaxed)
    }

    fn candidates(&self, request: &SearchRequest) -> Result<Vec<Stored>> {
        match &request.pit {
            Some(pit) => {
                let mut state = self.state.write();
                let now = Instant::now();
                state.pits.retain(|_, snapshot| snapshot.expires_at > now);
                let expires_at = expiry(now, &pit.keep_alive)?;
                let snapshot = state.pits.get_mut(&pit.id).ok_or_else(|| {
                    EngineError::NotFound(format!("no search context found for id [{}]", pit.id))
                })?;
                snapshot.expires_at = expires_at;
                Ok(snapshot.docs.clone())
            }
            None => {
                let state = self.state.read();
                Ok(state.documents(&state.resolve(&request.index)))
            }
        }
    }

    fn check_window(&self, request: &SearchRequest) -> Result<()> {
        let from = request.from.unwrap_or(0);
        if request.search_after.is_some() && from > 0 {
            return Err(EngineError::Status {
                status: 400,
                kind: "illegal_argument_exception".to_string(),
                reason: "[from] parameter must be set to 0 when [search_after] is used".to_string(),
            });
        }
        let window = from + request.size;
        if window > self.max_result_window {
            return Err(EngineError::Status {
                status: 400,
                kind: "illegal_argument_exception".to_string(),
                reason: format!(
                    "Result window is too large, from + size must be less than or equal to: \
                     [{}] but was [{}]",
                    self.max_result_window, window
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentEngine for MemoryEngine {
    async fn bulk(&self, request: BulkRequest) -> Result<BulkResult> {
        self.bulk_requests.fetch_add(1, AtomicOrdering::Relaxed);
        let mut state = self.state.write();
        let items: Vec<BulkItemResult> = request
            .operations
            .into_iter()
            .map(|op| state.apply(op))
            .collect();
        let errors = items.iter().any(|i| i.error.is_some());
        Ok(BulkResult { errors, items })
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        self.search_requests.fetch_add(1, AtomicOrdering::Relaxed);
        self.check_window(&request)?;
        let candidates = self.candidates(&request)?;
        let matched: Vec<Stored> = candidates
            .into_iter()
            .filter(|d| eval::matches(&request.query, &d.id, &d.source))
            .collect();

        let sources: Vec<&Value> = matched.iter().map(|d| &d.source).collect();
        let aggregations = aggs::evaluate(&request.aggregations, &sources);

        let with_tiebreaker = request.pit.is_some();
        let mut sorted: Vec<(Vec<Value>, &Stored)> = matched
            .iter()
            .map(|d| {
                let mut values = eval::sort_values(&d.source, &request.sort);
                if with_tiebreaker {
                    values.push(json!(d.seq));
                }
                (values, d)
            })
            .collect();
        sorted.sort_by(|(a, da), (b, db)| {
            eval::compare_sort_tuple(a, b, &request.sort).then_with(|| da.seq.cmp(&db.seq))
        });
        if let Some(after) = &request.search_after {
            sorted.retain(|(values, _)| {
                eval::compare_sort_tuple(values, after, &request.sort) == Ordering::Greater
            });
        }

        let total_hits = matched.len() as i64;
        let hits: Vec<Hit> = sorted
            .into_iter()
            .skip(request.from.unwrap_or(0))
            .take(request.size)
            .map(|(values, d)| Hit {
                index: d.index.clone(),
                id: d.id.clone(),
                source: d.source.clone(),
                sort: if request.sort.is_empty() && !with_tiebreaker {
                    Vec::new()
                } else {
                    values
                },
            })
            .collect();
        debug!(
            target: "siftlog::engine",
            index = %request.index,
            total_hits,
            returned = hits.len(),
            "memory search"
        );
        Ok(SearchResponse {
            timed_out: false,
            total_hits,
            hits,
            aggregations,
            pit_id: request.pit.map(|p| p.id),
        })
    }

    async fn open_point_in_time(&self, index: &str, keep_alive: &str) -> Result<String> {
        let expires_at = expiry(Instant::now(), keep_alive)?;
        let mut state = self.state.write();
        let indices = state.resolve(index);
        let docs = state.documents(&indices);
        let id = Uuid::new_v4().simple().to_string();
        state.pits.insert(
            id.clone(),
            PitSnapshot {
                docs,
                expires_at,
            },
        );
        Ok(id)
    }

    async fn close_point_in_time(&self, pit_id: &str) -> Result<()> {
        match self.state.write().pits.remove(pit_id) {
            Some(_) => Ok(()),
            None => Err(EngineError::NotFound(format!(
                "no search context found for id [{pit_id}]"
            ))),
        }
    }

    async fn put_index_template(&self, template: IndexTemplate) -> Result<()> {
        self.state.write().templates.insert(template.name.clone(), template);
        Ok(())
    }

    async fn create_index(&self, request: CreateIndex) -> Result<()> {
        self.state.write().create_index(&request)
    }
}
