//! All log-type backends over one document engine
//!
//! ```text
//! BackendConfig ──► HttpEngine ──┐
//!                                ├──► LogStore { flow_logs, flows, dns,
//!        SchemaInitializer ──────┘              audit, waf, events }
//!                                     (one provisioning cache for all)
//! ```

use crate::backend::LogBackend;
use crate::config::{BackendConfig, StorageConfig};
use crate::initializer::SchemaInitializer;
use crate::schemas::{
    AuditBackend, DnsLogSchema, EventSchema, FlowBackend, FlowLogSchema, WafLogSchema,
};
use siftlog_core::Result;
use siftlog_engine::{DocumentEngine, HttpEngine};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Every backend, sharing one engine and one provisioning cache
#[derive(Debug)]
pub struct LogStore {
    pub flow_logs: LogBackend<FlowLogSchema>,
    pub flows: FlowBackend,
    pub dns: LogBackend<DnsLogSchema>,
    pub audit: AuditBackend,
    pub waf: LogBackend<WafLogSchema>,
    pub events: LogBackend<EventSchema>,
}

impl LogStore {
    /// Connect to the engine described by `config`
    pub fn open(config: &BackendConfig) -> Result<Self> {
        config.storage.validate()?;
        let engine = HttpEngine::new(&config.engine)?;
        info!(
            url = %config.engine.url,
            single_index = config.storage.single_index,
            "opening log store"
        );
        Ok(Self::with_engine(Arc::new(engine), &config.storage))
    }

    /// Read the configuration at `path` and connect
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&BackendConfig::from_file(path.as_ref())?)
    }

    /// Backends over an existing engine
    pub fn with_engine(engine: Arc<dyn DocumentEngine>, storage: &StorageConfig) -> Self {
        let init = Arc::new(SchemaInitializer::new(engine.clone(), storage));
        LogStore {
            flow_logs: LogBackend::with_initializer(
                engine.clone(),
                FlowLogSchema,
                storage,
                init.clone(),
            ),
            flows: FlowBackend::new(engine.clone(), storage),
            dns: LogBackend::with_initializer(engine.clone(), DnsLogSchema, storage, init.clone()),
            audit: AuditBackend::with_initializer(engine.clone(), storage, init.clone()),
            waf: LogBackend::with_initializer(engine.clone(), WafLogSchema, storage, init.clone()),
            events: LogBackend::with_initializer(engine, EventSchema, storage, init),
        }
    }
}
