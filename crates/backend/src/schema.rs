//! Per-log-type description consumed by the generic backend
//!
//! A [`LogSchema`] names everything that differs between log types: record
//! and params types, index family, time field, searchable fields and RBAC
//! strategy. [`LogBackend`](crate::backend::LogBackend) supplies the rest.
//!
//! Documents are stored with three fields the record itself does not own:
//!
//! | Field            | Value                                         |
//! |------------------|-----------------------------------------------|
//! | `cluster`        | cluster of the writing [`ClusterInfo`]         |
//! | `tenant`         | tenant of the writer; absent when empty        |
//! | `generated_time` | ingestion time, RFC 3339 with milliseconds     |
//!
//! The record's `id` is never stored in the document body; it is the
//! engine document ID instead.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use siftlog_core::{ClusterInfo, Error, LogParams, Result};
use siftlog_engine::Hit;
use siftlog_query::{
    FieldSet, IndexRouter, LogIndex, Query, QueryHelper, RbacStrategy, TimeFormat, CLUSTER_FIELD,
    GENERATED_TIME_FIELD, TENANT_FIELD,
};

/// Body key holding the caller-visible record ID
pub const ID_FIELD: &str = "id";

/// Static description of one log type
pub trait LogSchema: Send + Sync + 'static {
    /// Stored record
    type Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;
    /// List params
    type Params: LogParams + 'static;

    /// Log type name used in spans and messages
    fn name(&self) -> &'static str;

    fn index(&self) -> LogIndex;

    /// Field reads filter on by default
    fn time_field(&self) -> &'static str;

    fn time_format(&self) -> TimeFormat;

    fn fields(&self) -> &'static FieldSet;

    fn rbac(&self) -> RbacStrategy;

    /// Caller-visible ID of a record, if it carries one
    fn id_of(record: &Self::Record) -> Option<&str>;

    /// Log-type specific clauses ANDed into every read
    fn extra_query(
        &self,
        _ci: &ClusterInfo,
        _router: &IndexRouter,
        _params: &Self::Params,
    ) -> Result<Vec<Query>> {
        Ok(Vec::new())
    }

    /// Query helper for this schema under `router`'s layout
    fn query_helper(&self, router: IndexRouter) -> QueryHelper {
        QueryHelper::new(
            router,
            self.time_field(),
            self.time_format(),
            self.fields(),
            self.rbac(),
        )
    }
}

/// A log type whose stored records may be updated and deleted
pub trait MutableSchema: LogSchema {
    /// Partial document written by an update of `record`
    fn update_document(record: &Self::Record) -> Value;
}

/// Render `record` as the document stored for `ci`
pub fn encode<S: LogSchema>(
    record: &S::Record,
    ci: &ClusterInfo,
    generated_time: DateTime<Utc>,
) -> Result<Value> {
    let mut doc = serde_json::to_value(record)?;
    let Some(obj) = doc.as_object_mut() else {
        return Err(Error::Serialization(format!(
            "{} record is not a JSON object",
            std::any::type_name::<S::Record>()
        )));
    };
    obj.remove(ID_FIELD);
    obj.insert(CLUSTER_FIELD.to_string(), Value::from(ci.cluster.as_str()));
    if ci.tenant.is_empty() {
        obj.remove(TENANT_FIELD);
    } else {
        obj.insert(TENANT_FIELD.to_string(), Value::from(ci.tenant.as_str()));
    }
    obj.insert(
        GENERATED_TIME_FIELD.to_string(),
        Value::from(generated_time.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    Ok(doc)
}

/// Tenant and cluster stamped on a stored document
pub fn stamped_scope(source: &Value) -> (&str, &str) {
    let tenant = source.get(TENANT_FIELD).and_then(Value::as_str).unwrap_or("");
    let cluster = source.get(CLUSTER_FIELD).and_then(Value::as_str).unwrap_or("");
    (tenant, cluster)
}

/// Caller-visible ID of a hit
pub fn bare_id(router: &IndexRouter, hit: &Hit) -> String {
    let (tenant, cluster) = stamped_scope(&hit.source);
    router.bare_id(&hit.id, tenant, cluster).to_string()
}

/// Rebuild a record from a hit
pub fn decode<S: LogSchema>(router: &IndexRouter, hit: Hit) -> Result<S::Record> {
    let id = bare_id(router, &hit);
    let mut source = hit.source;
    match source.as_object_mut() {
        Some(obj) => {
            obj.insert(ID_FIELD.to_string(), Value::from(id));
        }
        None => {
            return Err(Error::Serialization(format!(
                "document {} has no JSON object source",
                hit.id
            )))
        }
    }
    Ok(serde_json::from_value(source)?)
}
