//! Per-log-type storage backends for siftlog
//!
//! Each log type is described by a [`LogSchema`](schema::LogSchema) and
//! served by a generic [`LogBackend`]. The building blocks:
//!
//! - `config`: `siftlog.toml` loading and validation
//! - `schema`: log type descriptions and document encoding
//! - `initializer`: lazy, once-per-target index provisioning
//! - `writer`: bulk create, update and delete
//! - `paginator`: offset and point-in-time paging
//! - `composite`: composite aggregation paging
//! - `schemas`: the concrete log types
//! - `store`: every backend over one engine

pub mod backend;
pub mod composite;
pub mod config;
pub mod initializer;
pub mod paginator;
pub mod schema;
pub mod schemas;
pub mod store;
pub mod writer;

pub use backend::LogBackend;
pub use config::{BackendConfig, StorageConfig, CONFIG_FILE_NAME};
pub use initializer::SchemaInitializer;
pub use schema::{LogSchema, MutableSchema};
pub use schemas::{
    AuditBackend, AuditSchema, DnsLogSchema, EventSchema, FlowBackend, FlowLogSchema, WafLogSchema,
};
pub use store::LogStore;
pub use writer::{DOCUMENT_MISSING, MISSING_ID, SERIALIZATION_FAILURE};
