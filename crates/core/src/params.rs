//! Request parameters shared by every log type
//!
//! Each log type defines its own params struct and implements
//! [`LogParams`] for it. The backend only ever talks to the trait.

use crate::after_key::AfterKey;
use crate::error::{Error, Result};
use crate::time::TimeRange;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Page size used when a request asks for 0
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Verb a grant must carry to allow reads
pub const LIST_VERB: &str = "list";

// ============================================================================
// Permissions
// ============================================================================

/// One authorization grant held by the caller.
///
/// `namespace == None` means the grant applies cluster-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// API group of the resource, empty for the core group
    #[serde(default)]
    pub api_group: String,
    /// Resource kind, e.g. `pods`
    pub resource: String,
    /// Verb, e.g. `list`
    pub verb: String,
    /// Namespace the grant is limited to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Permission {
    /// Cluster-wide `list` grant on a resource
    pub fn cluster_wide(api_group: &str, resource: &str) -> Self {
        Permission {
            api_group: api_group.to_string(),
            resource: resource.to_string(),
            verb: LIST_VERB.to_string(),
            namespace: None,
        }
    }

    /// Namespaced `list` grant on a resource
    pub fn namespaced(api_group: &str, resource: &str, namespace: &str) -> Self {
        Permission {
            api_group: api_group.to_string(),
            resource: resource.to_string(),
            verb: LIST_VERB.to_string(),
            namespace: Some(namespace.to_string()),
        }
    }

    /// True when this grant allows listing
    pub fn allows_list(&self) -> bool {
        self.verb == LIST_VERB
    }
}

// ============================================================================
// Common parameter blocks
// ============================================================================

/// Sort instruction on a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    /// Field to sort on
    pub field: String,
    /// Sort descending instead of ascending
    #[serde(default)]
    pub descending: bool,
}

impl SortBy {
    /// Ascending sort on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        SortBy {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending sort on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        SortBy {
            field: field.into(),
            descending: true,
        }
    }
}

/// Time range, paging and scoping shared by all reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Window to read; the last five minutes when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    /// Page size; 0 selects [`DEFAULT_PAGE_SIZE`], negative is rejected
    #[serde(default)]
    pub max_page_size: i64,
    /// Cursor returned by the previous page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_key: Option<AfterKey>,
    /// Clusters to read when querying several clusters; empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
    /// Upper bound on the call's duration
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl QueryParams {
    /// Builder: set the time range
    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    /// Builder: set the page size
    pub fn with_max_page_size(mut self, size: i64) -> Self {
        self.max_page_size = size;
        self
    }

    /// Builder: set the cursor
    pub fn with_after_key(mut self, key: Option<AfterKey>) -> Self {
        self.after_key = key;
        self
    }

    /// Builder: select clusters for a multi-cluster read
    pub fn with_clusters(mut self, clusters: Vec<String>) -> Self {
        self.clusters = clusters;
        self
    }

    /// Builder: bound the call's duration
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Selector and RBAC grants of a read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSelectionParams {
    /// Filter expression, empty for none
    #[serde(default)]
    pub selector: String,
    /// Caller grants; `None` skips RBAC filtering, `Some(empty)` is forbidden
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<Permission>>,
}

// ============================================================================
// Capability trait
// ============================================================================

/// Capability set every log type's params expose to the backend
pub trait LogParams: Send + Sync {
    /// Time, paging and cluster scoping
    fn query_params(&self) -> &QueryParams;

    /// Selector and grants, if the log type supports them
    fn selection(&self) -> Option<&LogSelectionParams> {
        None
    }

    /// Requested sort, empty for the log type's default
    fn sort_by(&self) -> &[SortBy] {
        &[]
    }

    /// Time range, if one was given
    fn time_range(&self) -> Option<&TimeRange> {
        self.query_params().time_range.as_ref()
    }

    /// Selector text, empty for none
    fn selector(&self) -> &str {
        self.selection().map(|s| s.selector.as_str()).unwrap_or("")
    }

    /// Caller grants
    fn permissions(&self) -> Option<&[Permission]> {
        self.selection().and_then(|s| s.permissions.as_deref())
    }

    /// Cursor of the requested page
    fn after_key(&self) -> Option<&AfterKey> {
        self.query_params().after_key.as_ref()
    }

    /// Raw page size as requested
    fn max_page_size(&self) -> i64 {
        self.query_params().max_page_size
    }

    /// Clusters selected for a multi-cluster read
    fn clusters(&self) -> &[String] {
        &self.query_params().clusters
    }

    /// Upper bound on the call's duration
    fn timeout(&self) -> Option<Duration> {
        self.query_params().timeout
    }

    /// Effective page size
    fn page_size(&self) -> Result<usize> {
        resolve_page_size(self.max_page_size(), DEFAULT_PAGE_SIZE)
    }
}

impl LogParams for QueryParams {
    fn query_params(&self) -> &QueryParams {
        self
    }
}

/// Turn a requested page size into an effective one
pub fn resolve_page_size(requested: i64, default: usize) -> Result<usize> {
    if requested < 0 {
        return Err(Error::invalid_request("parameter cannot be negative"));
    }
    if requested == 0 {
        return Ok(default);
    }
    Ok(requested as usize)
}

// ============================================================================
// Aggregations
// ============================================================================

/// Aggregation results keyed by aggregation name, in the engine's format
pub type Aggregations = Map<String, Value>;

/// Raw aggregation request over a log type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationParams<P> {
    /// Scoping of the documents to aggregate
    #[serde(flatten)]
    pub params: P,
    /// Aggregations by name, in the engine's request format
    #[serde(default)]
    pub aggregations: Map<String, Value>,
    /// Hits to return alongside the aggregations
    #[serde(default)]
    pub num_buckets: usize,
}
