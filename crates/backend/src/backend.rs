//! Generic per-log-type backend
//!
//! [`LogBackend`] wires the writer, paginator and query builder for one
//! [`LogSchema`]. Every call:
//!
//! 1. runs inside the span of its [`ClusterInfo`]
//! 2. validates the tenancy context before touching the engine
//! 3. is bounded by the params' timeout, when one is set

use crate::config::StorageConfig;
use crate::initializer::SchemaInitializer;
use crate::paginator::{PageRequest, Paginator};
use crate::schema::{self, LogSchema, MutableSchema};
use crate::writer::BulkWriter;
use serde_json::Value;
use siftlog_core::{
    resolve_page_size, AggregationParams, Aggregations, BulkResponse, ClusterInfo, Error, List,
    LogParams, Result,
};
use siftlog_engine::{DocumentEngine, Hit, SearchRequest};
use siftlog_query::aggregation::aggs_from_json;
use siftlog_query::{IndexRouter, QueryHelper};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn, Instrument};

/// Run `fut`, failing with `DeadlineExceeded` once `timeout` elapses
pub(crate) async fn with_deadline<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::DeadlineExceeded(limit))?,
        None => fut.await,
    }
}

/// Storage backend of one log type
pub struct LogBackend<S: LogSchema> {
    engine: Arc<dyn DocumentEngine>,
    schema: S,
    helper: QueryHelper,
    initializer: Arc<SchemaInitializer>,
    storage: StorageConfig,
}

impl<S: LogSchema> LogBackend<S> {
    /// Backend with its own provisioning cache
    pub fn new(engine: Arc<dyn DocumentEngine>, schema: S, storage: &StorageConfig) -> Self {
        let initializer = Arc::new(SchemaInitializer::new(engine.clone(), storage));
        Self::with_initializer(engine, schema, storage, initializer)
    }

    /// Backend sharing a provisioning cache with other backends
    pub fn with_initializer(
        engine: Arc<dyn DocumentEngine>,
        schema: S,
        storage: &StorageConfig,
        initializer: Arc<SchemaInitializer>,
    ) -> Self {
        let helper = schema.query_helper(IndexRouter::new(schema.index(), storage.layout()));
        LogBackend {
            engine,
            schema,
            helper,
            initializer,
            storage: storage.clone(),
        }
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn router(&self) -> &IndexRouter {
        self.helper.router()
    }

    pub fn initializer(&self) -> &SchemaInitializer {
        &self.initializer
    }

    fn writer(&self) -> BulkWriter<'_> {
        BulkWriter::new(self.engine.as_ref(), &self.initializer, &self.helper)
    }

    /// Store records for `ci`
    pub async fn create(&self, ci: &ClusterInfo, records: Vec<S::Record>) -> Result<BulkResponse> {
        self.writer()
            .create::<S>(ci, &records)
            .instrument(ci.span(self.schema.name()))
            .await
    }

    /// One page of records matching `params`
    pub async fn list(&self, ci: &ClusterInfo, params: &S::Params) -> Result<List<S::Record>> {
        with_deadline(params.timeout(), self.list_page(ci, params))
            .instrument(ci.span(self.schema.name()))
            .await
    }

    async fn list_page(&self, ci: &ClusterInfo, params: &S::Params) -> Result<List<S::Record>> {
        ci.valid()?;
        let size = resolve_page_size(params.max_page_size(), self.storage.default_page_size)?;
        let index = self.router().read_pattern(ci, params.clusters())?;
        let extra = self.schema.extra_query(ci, self.router(), params)?;
        let query = self.helper.build_query(ci, params, extra)?;
        let sort = self.helper.sort(params)?;
        debug!(index = %index, size, "listing documents");

        let paginator = Paginator::new(
            self.engine.as_ref(),
            self.storage.deep_pagination_cutoff,
            &self.storage.pit_keep_alive,
        );
        let page = paginator
            .page(PageRequest {
                index,
                query,
                sort,
                size,
                after_key: params.after_key().cloned(),
            })
            .await?;
        Ok(List {
            items: self.decode_hits(page.hits),
            total_hits: page.total_hits,
            after_key: page.after_key,
        })
    }

    fn decode_hits(&self, hits: Vec<Hit>) -> Vec<S::Record> {
        hits.into_iter()
            .filter_map(|hit| {
                let id = hit.id.clone();
                match schema::decode::<S>(self.router(), hit) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(id = %id, error = %e, "skipping document that failed to decode");
                        None
                    }
                }
            })
            .collect()
    }

    /// Run raw aggregations over the records matching `params`
    pub async fn aggregations(
        &self,
        ci: &ClusterInfo,
        params: &AggregationParams<S::Params>,
    ) -> Result<Aggregations> {
        with_deadline(params.params.timeout(), self.aggregate(ci, params))
            .instrument(ci.span(self.schema.name()))
            .await
    }

    async fn aggregate(
        &self,
        ci: &ClusterInfo,
        params: &AggregationParams<S::Params>,
    ) -> Result<Aggregations> {
        ci.valid()?;
        let aggs = aggs_from_json(&Value::Object(params.aggregations.clone()))?;
        let index = self.router().read_pattern(ci, params.params.clusters())?;
        let extra = self.schema.extra_query(ci, self.router(), &params.params)?;
        let query = self.helper.build_query(ci, &params.params, extra)?;

        let mut request = SearchRequest::new(index.as_str(), query).size(params.num_buckets);
        for (name, agg) in aggs {
            request = request.aggregation(name, agg);
        }
        debug!(index = %index, "running aggregations");
        let resp = self
            .engine
            .search(request)
            .await
            .map_err(|e| e.context(format!("failed to search {index}")))?;
        if resp.timed_out {
            return Err(Error::upstream("aggregations", format!("timed out querying {index}")));
        }
        Ok(resp.aggregations)
    }
}

impl<S: MutableSchema> LogBackend<S> {
    /// Rewrite the mutable fields of stored records
    pub async fn update(&self, ci: &ClusterInfo, records: Vec<S::Record>) -> Result<BulkResponse> {
        self.writer()
            .update::<S>(ci, &records)
            .instrument(ci.span(self.schema.name()))
            .await
    }

    /// Remove stored records
    pub async fn delete(&self, ci: &ClusterInfo, records: Vec<S::Record>) -> Result<BulkResponse> {
        self.writer()
            .delete::<S>(ci, &records)
            .instrument(ci.span(self.schema.name()))
            .await
    }
}

impl<S: LogSchema> std::fmt::Debug for LogBackend<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBackend")
            .field("log_type", &self.schema.name())
            .field("layout", &self.router().layout())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let err = with_deadline(Some(Duration::from_millis(5)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded(_)));
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test]
    async fn test_no_deadline() {
        let v = with_deadline(None, async { Ok(7) }).await.unwrap();
        assert_eq!(v, 7);
    }
}
