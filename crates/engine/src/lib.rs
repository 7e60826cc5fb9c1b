//! Document engine access for the siftlog backend
//!
//! - `client`: the [`DocumentEngine`] trait
//! - `types`: bulk, index management and search messages
//! - `http`: REST implementation
//! - `memory`: in-process implementation

pub mod client;
pub mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use client::DocumentEngine;
pub use error::{EngineError, Result};
pub use http::{HttpEngine, HttpEngineConfig};
pub use memory::MemoryEngine;
pub use types::{
    BulkAction, BulkItemResult, BulkOperation, BulkRequest, BulkResult, CreateIndex, ErrorCause,
    Hit, IndexTemplate, PointInTime, RefreshPolicy, SearchRequest, SearchResponse,
};
