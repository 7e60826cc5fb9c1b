//! Kubernetes and enterprise audit logs
//!
//! Both subtypes share a record shape and field set but live in separate
//! index families. [`AuditBackend`] routes each call to the backend of the
//! requested subtype.

use crate::backend::LogBackend;
use crate::config::StorageConfig;
use crate::initializer::SchemaInitializer;
use crate::schema::LogSchema;
use once_cell::sync::Lazy;
use siftlog_core::records::audit::{AuditLog, AuditLogParams, AuditLogType};
use siftlog_core::{AggregationParams, Aggregations, BulkResponse, ClusterInfo, Error, List, Result};
use siftlog_engine::DocumentEngine;
use siftlog_query::index::{AUDIT_EE_LOGS, AUDIT_KUBE_LOGS};
use siftlog_query::{FieldSet, FieldSpec, LogIndex, RbacStrategy, TimeFormat, ValueKind};
use std::sync::Arc;

static AUDIT_LOG_FIELDS: Lazy<FieldSet> = Lazy::new(|| {
    FieldSet::new(&[
        ("auditID", FieldSpec::new(ValueKind::Keyword)),
        ("level", FieldSpec::new(ValueKind::Keyword)),
        ("stage", FieldSpec::new(ValueKind::Keyword)),
        ("verb", FieldSpec::new(ValueKind::Keyword)),
        ("requestURI", FieldSpec::new(ValueKind::Keyword)),
        ("user.username", FieldSpec::new(ValueKind::Keyword)),
        ("user.groups", FieldSpec::new(ValueKind::Keyword)),
        ("objectRef.resource", FieldSpec::new(ValueKind::Keyword)),
        ("objectRef.namespace", FieldSpec::new(ValueKind::Keyword)),
        ("objectRef.name", FieldSpec::new(ValueKind::Keyword)),
        ("objectRef.apiGroup", FieldSpec::new(ValueKind::Keyword)),
        ("objectRef.apiVersion", FieldSpec::new(ValueKind::Keyword)),
        ("responseStatus.code", FieldSpec::new(ValueKind::Integer)),
        ("requestReceivedTimestamp", FieldSpec::new(ValueKind::Date)),
        ("stageTimestamp", FieldSpec::new(ValueKind::Date)),
    ])
});

/// Audit logs of one subtype
#[derive(Debug, Clone, Copy)]
pub struct AuditSchema {
    kind: AuditLogType,
}

impl AuditSchema {
    pub fn new(kind: AuditLogType) -> Self {
        AuditSchema { kind }
    }

    pub fn kind(&self) -> AuditLogType {
        self.kind
    }
}

impl LogSchema for AuditSchema {
    type Record = AuditLog;
    type Params = AuditLogParams;

    fn name(&self) -> &'static str {
        match self.kind {
            AuditLogType::Kube => "audit_kube",
            AuditLogType::Ee => "audit_ee",
        }
    }

    fn index(&self) -> LogIndex {
        match self.kind {
            AuditLogType::Kube => AUDIT_KUBE_LOGS,
            AuditLogType::Ee => AUDIT_EE_LOGS,
        }
    }

    fn time_field(&self) -> &'static str {
        "requestReceivedTimestamp"
    }

    fn time_format(&self) -> TimeFormat {
        TimeFormat::Rfc3339
    }

    fn fields(&self) -> &'static FieldSet {
        &AUDIT_LOG_FIELDS
    }

    fn rbac(&self) -> RbacStrategy {
        RbacStrategy::Unrestricted
    }

    fn id_of(record: &AuditLog) -> Option<&str> {
        record.id.as_deref()
    }
}

/// Audit logs of both subtypes
#[derive(Debug)]
pub struct AuditBackend {
    kube: LogBackend<AuditSchema>,
    ee: LogBackend<AuditSchema>,
}

impl AuditBackend {
    pub fn new(engine: Arc<dyn DocumentEngine>, storage: &StorageConfig) -> Self {
        let initializer = Arc::new(SchemaInitializer::new(engine.clone(), storage));
        Self::with_initializer(engine, storage, initializer)
    }

    pub fn with_initializer(
        engine: Arc<dyn DocumentEngine>,
        storage: &StorageConfig,
        initializer: Arc<SchemaInitializer>,
    ) -> Self {
        AuditBackend {
            kube: LogBackend::with_initializer(
                engine.clone(),
                AuditSchema::new(AuditLogType::Kube),
                storage,
                initializer.clone(),
            ),
            ee: LogBackend::with_initializer(
                engine,
                AuditSchema::new(AuditLogType::Ee),
                storage,
                initializer,
            ),
        }
    }

    /// Backend of one subtype
    pub fn backend(&self, kind: AuditLogType) -> &LogBackend<AuditSchema> {
        match kind {
            AuditLogType::Kube => &self.kube,
            AuditLogType::Ee => &self.ee,
        }
    }

    fn requested(&self, params: &AuditLogParams) -> Result<&LogBackend<AuditSchema>> {
        params
            .audit_type
            .map(|kind| self.backend(kind))
            .ok_or_else(|| Error::invalid_request("audit log type is required"))
    }

    /// Store audit logs of subtype `kind`
    pub async fn create(
        &self,
        kind: AuditLogType,
        ci: &ClusterInfo,
        logs: Vec<AuditLog>,
    ) -> Result<BulkResponse> {
        self.backend(kind).create(ci, logs).await
    }

    /// One page of audit logs of the subtype named in `params`
    pub async fn list(&self, ci: &ClusterInfo, params: &AuditLogParams) -> Result<List<AuditLog>> {
        self.requested(params)?.list(ci, params).await
    }

    pub async fn aggregations(
        &self,
        ci: &ClusterInfo,
        params: &AggregationParams<AuditLogParams>,
    ) -> Result<Aggregations> {
        self.requested(&params.params)?.aggregations(ci, params).await
    }
}
