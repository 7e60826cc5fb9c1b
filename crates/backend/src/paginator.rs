//! Hit list paging
//!
//! Two regimes, chosen per traversal:
//!
//! - **Shallow**: the cursor is `{startFrom: N}` and every page re-runs the
//!   query at offset `N`. Cheap, but bounded by the engine's result window.
//! - **Deep**: once a page reports more than `deep_pagination_cutoff` total
//!   hits, a point in time is opened over the read pattern and the cursor
//!   also carries `pitId`. The first page under the PIT uses offset
//!   `startFrom`; later pages continue from `searchAfter`, the sort values
//!   (engine tie-breaker included) of the last hit returned.
//!
//! The PIT is closed as soon as a page comes back short or reaches the last
//! hit. A caller that abandons the traversal leaves it to the engine's
//! keep-alive.
//!
//! `after_key == None` means there are no more pages.

use serde_json::Value;
use siftlog_core::after_key::{PIT_ID, SEARCH_AFTER, START_FROM};
use siftlog_core::{AfterKey, Error, Result};
use siftlog_engine::{DocumentEngine, Hit, PointInTime, SearchRequest, SearchResponse};
use siftlog_query::{Query, SortField};
use tracing::{debug, warn};

/// Position decoded from a caller's cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    pub start_from: usize,
    pub pit_id: Option<String>,
    pub search_after: Option<Vec<Value>>,
}

impl Cursor {
    /// Decode a cursor; `None` is the first page.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a cursor value has the wrong type.
    pub fn parse(after_key: Option<&AfterKey>) -> Result<Self> {
        let Some(key) = after_key else {
            return Ok(Cursor::default());
        };
        let start_from = match key.get(START_FROM) {
            None => 0,
            Some(v) => parse_start_from(v).ok_or_else(|| {
                Error::invalid_request(format!(
                    "Could not parse startFrom ({}) as an integer",
                    display(v)
                ))
            })?,
        };
        let pit_id = match key.get(PIT_ID) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(v) => {
                return Err(Error::invalid_request(format!(
                    "Could not parse pitId ({}) as a string",
                    display(v)
                )))
            }
        };
        let search_after = match key.get(SEARCH_AFTER) {
            None | Some(Value::Null) => None,
            Some(Value::Array(values)) => Some(values.clone()),
            Some(v) => {
                return Err(Error::invalid_request(format!(
                    "Could not parse searchAfter ({}) as a list",
                    display(v)
                )))
            }
        };
        Ok(Cursor {
            start_from,
            pit_id,
            search_after,
        })
    }
}

fn parse_start_from(v: &Value) -> Option<usize> {
    if let Some(n) = v.as_u64() {
        return usize::try_from(n).ok();
    }
    // JSON numbers that went through a float on the caller's side
    match v.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => Some(f as usize),
        _ => None,
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One page to fetch
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Read pattern
    pub index: String,
    pub query: Query,
    pub sort: Vec<SortField>,
    pub size: usize,
    pub after_key: Option<AfterKey>,
}

/// One page of raw hits
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub hits: Vec<Hit>,
    pub total_hits: i64,
    pub after_key: Option<AfterKey>,
}

/// Runs paged searches against a document engine
pub struct Paginator<'a> {
    engine: &'a dyn DocumentEngine,
    deep_pagination_cutoff: u64,
    pit_keep_alive: &'a str,
}

impl<'a> Paginator<'a> {
    pub fn new(
        engine: &'a dyn DocumentEngine,
        deep_pagination_cutoff: u64,
        pit_keep_alive: &'a str,
    ) -> Self {
        Paginator {
            engine,
            deep_pagination_cutoff,
            pit_keep_alive,
        }
    }

    /// Fetch the page `request.after_key` points at
    pub async fn page(&self, request: PageRequest) -> Result<Page> {
        let cursor = Cursor::parse(request.after_key.as_ref())?;
        let mut search = SearchRequest::new(request.index.as_str(), request.query)
            .size(request.size)
            .sort(request.sort);
        match (&cursor.pit_id, cursor.search_after.clone()) {
            (Some(pit_id), after) => {
                search = search.point_in_time(PointInTime {
                    id: pit_id.clone(),
                    keep_alive: self.pit_keep_alive.to_string(),
                });
                search = match after {
                    Some(values) => search.search_after(values),
                    None => search.offset(cursor.start_from),
                };
            }
            (None, _) => search = search.offset(cursor.start_from),
        }
        debug!(
            index = %request.index,
            start_from = cursor.start_from,
            deep = cursor.pit_id.is_some(),
            "fetching page"
        );

        let resp = self
            .engine
            .search(search)
            .await
            .map_err(|e| e.context(format!("failed to search {}", request.index)))?;
        if resp.timed_out {
            return Err(Error::upstream(
                "search",
                format!("timed out querying {}", request.index),
            ));
        }
        let after_key = self.next_after_key(&request.index, request.size, &cursor, &resp).await?;
        Ok(Page {
            hits: resp.hits,
            total_hits: resp.total_hits,
            after_key,
        })
    }

    async fn next_after_key(
        &self,
        index: &str,
        size: usize,
        cursor: &Cursor,
        resp: &SearchResponse,
    ) -> Result<Option<AfterKey>> {
        let next_start = cursor.start_from + resp.hits.len();
        let exhausted = resp.hits.is_empty()
            || resp.hits.len() < size
            || next_start as i64 >= resp.total_hits;

        let pit_id = cursor
            .pit_id
            .as_ref()
            .map(|id| resp.pit_id.clone().unwrap_or_else(|| id.clone()));
        if exhausted {
            if let Some(id) = pit_id {
                self.close(&id).await;
            }
            return Ok(None);
        }

        let mut key = AfterKey::default().with(START_FROM, next_start);
        match pit_id {
            Some(id) => {
                key = key.with(PIT_ID, id);
                if let Some(last) = resp.hits.last() {
                    key = key.with(SEARCH_AFTER, Value::Array(last.sort.clone()));
                }
            }
            None if resp.total_hits > self.deep_pagination_cutoff as i64 => {
                let id = self
                    .engine
                    .open_point_in_time(index, self.pit_keep_alive)
                    .await
                    .map_err(|e| e.context(format!("failed to open point in time over {index}")))?;
                debug!(index, total_hits = resp.total_hits, "switching to point-in-time paging");
                key = key.with(PIT_ID, id);
            }
            None => {}
        }
        Ok(Some(key))
    }

    async fn close(&self, pit_id: &str) {
        if let Err(e) = self.engine.close_point_in_time(pit_id).await {
            // The engine expires it after the keep-alive anyway
            warn!(error = %e, "failed to close point in time");
        }
    }
}
