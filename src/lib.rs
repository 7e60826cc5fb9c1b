//! siftlog - multi-tenant log-store backend over a document-index engine
//!
//! siftlog stores observability logs (flow, DNS, audit, WAF logs and
//! security events) for many tenants and clusters in one engine, and reads
//! them back with tenancy, time range, RBAC and selector filters applied.
//!
//! # Quick Start
//!
//! ```ignore
//! use siftlog::{BackendConfig, ClusterInfo, LogStore};
//!
//! let store = LogStore::open(&BackendConfig::from_file("siftlog.toml".as_ref())?)?;
//! let ci = ClusterInfo::new("cluster-a").with_tenant("acme");
//! let resp = store.flow_logs.create(&ci, logs).await?;
//! ```
//!
//! # Architecture
//!
//! | Crate             | Role                                              |
//! |-------------------|---------------------------------------------------|
//! | `siftlog-core`    | records, params, errors, tenancy context          |
//! | `siftlog-query`   | query DSL, index routing, selectors, RBAC         |
//! | `siftlog-engine`  | engine trait with HTTP and in-memory engines      |
//! | `siftlog-backend` | per-log-type backends, paging, composite queries  |

pub use siftlog_backend::*;
pub use siftlog_core::{
    records, AfterKey, AggregationParams, Aggregations, BulkError, BulkItem, BulkResponse,
    ClusterInfo, Error, ErrorKind, List, LogParams, LogSelectionParams, Permission, QueryParams,
    Result, SortBy, TimeRange, QUERY_MULTIPLE_CLUSTERS,
};
pub use siftlog_engine::{DocumentEngine, HttpEngine, HttpEngineConfig, MemoryEngine};
pub use siftlog_query::IndexLayout;

pub mod logging {
    //! Process-wide log output

    use tracing::Level;

    /// Install a formatting subscriber at `level`.
    ///
    /// Returns false when a global subscriber is already set; the existing
    /// one stays in place.
    pub fn init(level: Level) -> bool {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(true)
            .try_init()
            .is_ok()
    }
}
