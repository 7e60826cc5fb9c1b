//! Core types for the siftlog log-store backend
//!
//! This crate defines the shared vocabulary:
//! - `ClusterInfo`: tenancy context of every call
//! - `Error`/`Result`: error taxonomy
//! - `LogParams`: capability set of request params
//! - `BulkResponse`, `List`, `AfterKey`: results and cursors
//! - `records`: typed documents per log type

pub mod after_key;
pub mod bulk;
pub mod cluster;
pub mod error;
pub mod list;
pub mod params;
pub mod records;
pub mod time;

pub use after_key::AfterKey;
pub use bulk::{BulkError, BulkItem, BulkResponse};
pub use cluster::{validate_name, ClusterInfo, QUERY_MULTIPLE_CLUSTERS};
pub use error::{Error, ErrorKind, Result, SelectorErrorKind};
pub use list::List;
pub use params::{
    resolve_page_size, AggregationParams, Aggregations, LogParams, LogSelectionParams,
    Permission, QueryParams, SortBy, DEFAULT_PAGE_SIZE,
};
pub use time::TimeRange;
