//! The document engine seam
//!
//! Backends talk to the engine only through [`DocumentEngine`]. Two
//! implementations ship with this crate:
//! - [`HttpEngine`](crate::http::HttpEngine): the engine's REST API
//! - [`MemoryEngine`](crate::memory::MemoryEngine): in-process, for tests
//!   and embedding

use crate::error::Result;
use crate::types::{
    BulkRequest, BulkResult, CreateIndex, IndexTemplate, SearchRequest, SearchResponse,
};
use async_trait::async_trait;

/// Operations the backend needs from a document engine
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    /// Execute a batch of writes. Item failures are reported per item; only
    /// a failure of the request as a whole is an `Err`.
    async fn bulk(&self, request: BulkRequest) -> Result<BulkResult>;

    /// Run a search. Missing indices in the expression are ignored.
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse>;

    /// Open a point in time over `index`, returning its ID
    async fn open_point_in_time(&self, index: &str, keep_alive: &str) -> Result<String>;

    /// Release a point in time
    async fn close_point_in_time(&self, pit_id: &str) -> Result<()>;

    /// Create or replace an index template
    async fn put_index_template(&self, template: IndexTemplate) -> Result<()>;

    /// Create an index. Fails with `AlreadyExists` if it exists.
    async fn create_index(&self, request: CreateIndex) -> Result<()>;
}
