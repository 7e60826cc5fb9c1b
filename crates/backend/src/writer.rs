//! Batch writes
//!
//! All three operations send one bulk request and account for every
//! document in the returned [`BulkResponse`]. A document rejected by the
//! engine (or one that cannot be encoded) is a per-item error, never an
//! error of the call.
//!
//! Update and delete never address a document directly by the caller's ID.
//! They first re-read the IDs under the caller's tenancy filter, then send
//! each operation to the concrete index the document was found in. IDs the
//! caller cannot see are reported as `document_missing_exception` and not
//! sent at all.

use crate::initializer::SchemaInitializer;
use crate::schema::{self, LogSchema, MutableSchema};
use chrono::Utc;
use siftlog_core::{BulkItem, BulkResponse, ClusterInfo, Error, Result};
use siftlog_engine::{
    BulkItemResult, BulkOperation, BulkRequest, DocumentEngine, RefreshPolicy, SearchRequest,
};
use siftlog_query::{BoolQuery, IndexRouter, Query, QueryHelper};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Error type reported for documents that are not visible to the caller
pub const DOCUMENT_MISSING: &str = "document_missing_exception";

/// Error type reported for documents that could not be encoded
pub const SERIALIZATION_FAILURE: &str = "serialization_exception";

/// Error type reported for update/delete input without an ID
pub const MISSING_ID: &str = "missing_id";

/// IDs re-read per lookup search
const LOOKUP_CHUNK: usize = 1000;

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Update,
    Delete,
}

/// Writes records of one log type
pub struct BulkWriter<'a> {
    engine: &'a dyn DocumentEngine,
    initializer: &'a SchemaInitializer,
    helper: &'a QueryHelper,
}

impl<'a> BulkWriter<'a> {
    pub fn new(
        engine: &'a dyn DocumentEngine,
        initializer: &'a SchemaInitializer,
        helper: &'a QueryHelper,
    ) -> Self {
        BulkWriter {
            engine,
            initializer,
            helper,
        }
    }

    fn router(&self) -> &IndexRouter {
        self.helper.router()
    }

    /// Store `records` for `ci`
    pub async fn create<S: LogSchema>(
        &self,
        ci: &ClusterInfo,
        records: &[S::Record],
    ) -> Result<BulkResponse> {
        check_write_target(ci)?;
        let mut response = BulkResponse::default();
        if records.is_empty() {
            return Ok(response);
        }
        self.initializer
            .initialize(self.router(), self.helper.fields(), ci)
            .await?;

        let alias = self.router().write_alias(ci);
        let generated_time = Utc::now();
        let mut operations = Vec::with_capacity(records.len());
        let mut resources = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let id = S::id_of(record);
            let doc = match schema::encode::<S>(record, ci, generated_time) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(error = %e, position = i, "skipping document that failed to serialize");
                    response.push_error(
                        id.unwrap_or_default(),
                        SERIALIZATION_FAILURE,
                        e.to_string(),
                    );
                    continue;
                }
            };
            let doc_id = match (self.router().is_single_index(), id) {
                (true, Some(id)) => Some(self.router().document_id(ci, id)),
                (true, None) => {
                    let generated = Uuid::new_v4().simple().to_string();
                    Some(self.router().document_id(ci, &generated))
                }
                (false, id) => id.map(str::to_string),
            };
            resources.push(id.map(str::to_string));
            operations.push(BulkOperation::index(alias.as_str(), doc_id, doc));
        }
        if operations.is_empty() {
            return Ok(response);
        }

        debug!(alias = %alias, documents = operations.len(), "writing documents");
        let result = self
            .engine
            .bulk(BulkRequest::new(operations))
            .await
            .map_err(|e| e.context("failed to perform bulk create"))?;
        for (item, resource) in result.items.iter().zip(resources) {
            let resource = resource.unwrap_or_else(|| self.bare_id(ci, &item.id));
            record_outcome(&mut response, item, resource, None);
        }
        if !response.is_complete() {
            warn!(failed = response.failed, total = response.total, "bulk create partially failed");
        }
        Ok(response)
    }

    /// Overwrite the mutable fields of stored records
    pub async fn update<S: MutableSchema>(
        &self,
        ci: &ClusterInfo,
        records: &[S::Record],
    ) -> Result<BulkResponse> {
        let targets: Vec<(Option<&str>, Option<serde_json::Value>)> = records
            .iter()
            .map(|r| (S::id_of(r), Some(S::update_document(r))))
            .collect();
        self.mutate(ci, targets, Mutation::Update).await
    }

    /// Remove stored records
    pub async fn delete<S: LogSchema>(
        &self,
        ci: &ClusterInfo,
        records: &[S::Record],
    ) -> Result<BulkResponse> {
        let targets = records.iter().map(|r| (S::id_of(r), None)).collect();
        self.mutate(ci, targets, Mutation::Delete).await
    }

    async fn mutate(
        &self,
        ci: &ClusterInfo,
        targets: Vec<(Option<&str>, Option<serde_json::Value>)>,
        mutation: Mutation,
    ) -> Result<BulkResponse> {
        check_write_target(ci)?;
        let mut response = BulkResponse::default();
        if targets.is_empty() {
            return Ok(response);
        }

        let ids: Vec<&str> = targets.iter().filter_map(|(id, _)| *id).collect();
        let located = self.locate(ci, &ids).await?;

        let mut operations = Vec::with_capacity(targets.len());
        let mut resources = Vec::with_capacity(targets.len());
        for (id, partial) in targets {
            let Some(id) = id else {
                response.push_error("", MISSING_ID, "document has no ID");
                continue;
            };
            let doc_id = self.router().document_id(ci, id);
            let Some(index) = located.get(&doc_id) else {
                warn!(id, "document not visible to caller");
                response.push_error(id, DOCUMENT_MISSING, format!("[{id}]: document missing"));
                continue;
            };
            let op = match (mutation, partial) {
                (Mutation::Update, Some(partial)) => {
                    BulkOperation::update(index.as_str(), doc_id, partial)
                }
                _ => BulkOperation::delete(index.as_str(), doc_id),
            };
            operations.push(op);
            resources.push(id.to_string());
        }
        if operations.is_empty() {
            return Ok(response);
        }

        let result = self
            .engine
            .bulk(BulkRequest::new(operations).with_refresh(RefreshPolicy::WaitFor))
            .await
            .map_err(|e| e.context(format!("failed to perform bulk {}", mutation.verb())))?;
        for (item, resource) in result.items.iter().zip(resources) {
            record_outcome(&mut response, item, resource, Some(mutation));
        }
        Ok(response)
    }

    /// Concrete index of every ID visible to `ci`, keyed by document ID
    async fn locate(&self, ci: &ClusterInfo, ids: &[&str]) -> Result<HashMap<String, String>> {
        let mut located = HashMap::with_capacity(ids.len());
        if ids.is_empty() {
            return Ok(located);
        }
        let index = self.router().read_pattern(ci, &[])?;
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let doc_ids: Vec<String> = chunk
                .iter()
                .map(|id| self.router().document_id(ci, id))
                .collect();
            let mut query = BoolQuery::new();
            for clause in self.helper.tenancy_filter(ci, &[]) {
                query = query.filter(clause);
            }
            query = query.filter(Query::ids(doc_ids.iter().cloned()));
            let resp = self
                .engine
                .search(SearchRequest::new(index.as_str(), Query::Bool(query)).size(doc_ids.len()))
                .await
                .map_err(|e| e.context(format!("failed to look up documents in {index}")))?;
            for hit in resp.hits {
                located.insert(hit.id, hit.index);
            }
        }
        debug!(index = %index, requested = ids.len(), found = located.len(), "located documents");
        Ok(located)
    }

    fn bare_id(&self, ci: &ClusterInfo, doc_id: &str) -> String {
        self.router().bare_id(doc_id, &ci.tenant, &ci.cluster).to_string()
    }
}

impl Mutation {
    fn verb(&self) -> &'static str {
        match self {
            Mutation::Update => "update",
            Mutation::Delete => "delete",
        }
    }
}

/// Writes target exactly one real cluster
fn check_write_target(ci: &ClusterInfo) -> Result<()> {
    ci.valid()?;
    if ci.is_query_multiple_clusters() {
        return Err(Error::invalid_tenancy("cannot write to multiple clusters"));
    }
    Ok(())
}

fn record_outcome(
    response: &mut BulkResponse,
    item: &BulkItemResult,
    resource: String,
    mutation: Option<Mutation>,
) {
    if item.is_success() {
        response.push_success();
        let entry = BulkItem {
            id: resource,
            status: item.status,
        };
        match mutation {
            Some(Mutation::Update) => response.updated.push(entry),
            Some(Mutation::Delete) => response.deleted.push(entry),
            None => {}
        }
        return;
    }
    let (kind, reason) = match &item.error {
        Some(cause) => (cause.kind.clone(), cause.reason.clone()),
        None => ("unknown".to_string(), format!("status {}", item.status)),
    };
    response.push_error(resource, kind, reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_cannot_be_written() {
        let ci = ClusterInfo::new(siftlog_core::QUERY_MULTIPLE_CLUSTERS);
        let err = check_write_target(&ci).unwrap_err();
        assert!(err.is_validation());
        assert!(check_write_target(&ClusterInfo::default()).is_err());
        assert!(check_write_target(&ClusterInfo::new("c1")).is_ok());
    }

    #[test]
    fn test_record_outcome() {
        let mut resp = BulkResponse::default();
        let ok = BulkItemResult {
            action: siftlog_engine::BulkAction::Delete,
            index: "i".into(),
            id: "t:c:a".into(),
            status: 200,
            error: None,
        };
        record_outcome(&mut resp, &ok, "a".into(), Some(Mutation::Delete));
        let failed = BulkItemResult {
            status: 400,
            error: Some(siftlog_engine::ErrorCause {
                kind: "mapper_parsing_exception".into(),
                reason: "bad ip".into(),
            }),
            ..ok.clone()
        };
        record_outcome(&mut resp, &failed, "b".into(), None);
        assert_eq!(resp.total, 2);
        assert_eq!(resp.deleted, vec![BulkItem { id: "a".into(), status: 200 }]);
        assert_eq!(resp.errors[0].resource, "b");
        assert_eq!(resp.errors[0].kind, "mapper_parsing_exception");
    }
}
