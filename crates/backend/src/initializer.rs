//! Lazy schema provisioning
//!
//! Before the first write to a target (write alias), the target's index
//! template and bootstrap index are created. Each target is provisioned at
//! most once per process: concurrent first writers wait on the same
//! [`OnceCell`] instead of racing each other.
//!
//! Provisioning is idempotent on the engine side as well. An index or alias
//! that already exists (created by another process) counts as success.
//! A failed attempt leaves the cell empty so the next write retries.

use crate::config::StorageConfig;
use dashmap::DashMap;
use serde_json::json;
use siftlog_core::{ClusterInfo, Result};
use siftlog_engine::{CreateIndex, DocumentEngine, EngineError, IndexTemplate};
use siftlog_query::{FieldSet, IndexRouter};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Provisions index templates and bootstrap indices on first use
pub struct SchemaInitializer {
    engine: Arc<dyn DocumentEngine>,
    shards: u32,
    replicas: u32,
    targets: DashMap<String, Arc<OnceCell<()>>>,
}

impl SchemaInitializer {
    pub fn new(engine: Arc<dyn DocumentEngine>, storage: &StorageConfig) -> Self {
        SchemaInitializer {
            engine,
            shards: storage.shards,
            replicas: storage.replicas,
            targets: DashMap::new(),
        }
    }

    /// True once the target `ci` writes to under `router` is provisioned
    pub fn is_initialized(&self, router: &IndexRouter, ci: &ClusterInfo) -> bool {
        self.targets
            .get(&router.init_key(ci))
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    /// Provision the write target of `ci` unless already done
    pub async fn initialize(
        &self,
        router: &IndexRouter,
        fields: &FieldSet,
        ci: &ClusterInfo,
    ) -> Result<()> {
        let key = router.init_key(ci);
        let cell = self
            .targets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_try_init(|| self.provision(router, fields, ci, &key))
            .await?;
        Ok(())
    }

    async fn provision(
        &self,
        router: &IndexRouter,
        fields: &FieldSet,
        ci: &ClusterInfo,
        key: &str,
    ) -> Result<()> {
        let template = IndexTemplate {
            name: router.template_name(ci),
            patterns: vec![router.template_pattern(ci)],
            settings: json!({
                "number_of_shards": self.shards,
                "number_of_replicas": self.replicas,
            }),
            mappings: fields.mappings(),
        };
        debug!(
            template = %template.name,
            pattern = %template.patterns[0],
            "putting index template"
        );
        self.engine
            .put_index_template(template)
            .await
            .map_err(|e| e.context(format!("failed to create index template for {key}")))?;

        let bootstrap = router.bootstrap_index(ci);
        match self
            .engine
            .create_index(CreateIndex {
                name: bootstrap.clone(),
                write_alias: Some(router.write_alias(ci)),
            })
            .await
        {
            Ok(()) => info!(index = %bootstrap, alias = %key, "provisioned bootstrap index"),
            Err(EngineError::AlreadyExists(_)) => {
                debug!(index = %bootstrap, "bootstrap index already exists")
            }
            Err(e) => return Err(e.context(format!("failed to create index {bootstrap}"))),
        }
        Ok(())
    }
}

impl std::fmt::Debug for SchemaInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaInitializer")
            .field("shards", &self.shards)
            .field("replicas", &self.replicas)
            .field("targets", &self.targets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siftlog_engine::MemoryEngine;
    use siftlog_query::index::DNS_LOGS;
    use siftlog_query::{FieldSpec, IndexLayout, ValueKind};

    fn fields() -> FieldSet {
        FieldSet::new(&[("qname", FieldSpec::new(ValueKind::Keyword))])
    }

    #[tokio::test]
    async fn test_provisions_once() {
        let engine = Arc::new(MemoryEngine::new());
        let init = SchemaInitializer::new(engine.clone(), &StorageConfig::default());
        let router = IndexRouter::new(DNS_LOGS, IndexLayout::MultiIndex);
        let ci = ClusterInfo::new("c1");

        assert!(!init.is_initialized(&router, &ci));
        init.initialize(&router, &fields(), &ci).await.unwrap();
        init.initialize(&router, &fields(), &ci).await.unwrap();
        assert!(init.is_initialized(&router, &ci));
        assert_eq!(engine.index_names(), vec!["siftlog_dns.c1.000001".to_string()]);
    }

    #[tokio::test]
    async fn test_existing_index_is_success() {
        let engine = Arc::new(MemoryEngine::new());
        let router = IndexRouter::new(DNS_LOGS, IndexLayout::SingleIndex);
        let ci = ClusterInfo::new("c1");
        // Another process provisioned the shared index first
        let other = SchemaInitializer::new(engine.clone(), &StorageConfig::default());
        other.initialize(&router, &fields(), &ci).await.unwrap();

        let init = SchemaInitializer::new(engine.clone(), &StorageConfig::default());
        init.initialize(&router, &fields(), &ClusterInfo::new("c2"))
            .await
            .unwrap();
        assert_eq!(engine.index_names().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_writers() {
        let engine = Arc::new(MemoryEngine::new());
        let init = Arc::new(SchemaInitializer::new(engine.clone(), &StorageConfig::default()));
        let router = IndexRouter::new(DNS_LOGS, IndexLayout::MultiIndex);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let init = init.clone();
            handles.push(tokio::spawn(async move {
                init.initialize(&router, &fields(), &ClusterInfo::new("c1")).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(engine.index_names().len(), 1);
    }
}
