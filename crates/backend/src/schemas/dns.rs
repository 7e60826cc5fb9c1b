//! DNS query logs

use crate::schema::LogSchema;
use once_cell::sync::Lazy;
use siftlog_core::records::dns::{DnsLog, DnsLogParams};
use siftlog_query::index::DNS_LOGS;
use siftlog_query::{FieldSet, FieldSpec, LogIndex, RbacStrategy, TimeFormat, ValueKind};

/// Field the namespace RBAC strategy filters on
pub const CLIENT_NAMESPACE_FIELD: &str = "client_namespace";

static DNS_LOG_FIELDS: Lazy<FieldSet> = Lazy::new(|| {
    FieldSet::new(&[
        ("start_time", FieldSpec::new(ValueKind::Date)),
        ("end_time", FieldSpec::new(ValueKind::Date)),
        ("count", FieldSpec::new(ValueKind::Integer)),
        ("client_name", FieldSpec::new(ValueKind::Keyword)),
        ("client_name_aggr", FieldSpec::new(ValueKind::Keyword)),
        ("client_namespace", FieldSpec::new(ValueKind::Keyword)),
        ("client_ip", FieldSpec::new(ValueKind::Ip)),
        ("servers.name", FieldSpec::nested(ValueKind::Keyword, "servers")),
        ("servers.name_aggr", FieldSpec::nested(ValueKind::Keyword, "servers")),
        ("servers.namespace", FieldSpec::nested(ValueKind::Keyword, "servers")),
        // Upstream servers outside the cluster report no address
        ("servers.ip", FieldSpec::nested(ValueKind::Keyword, "servers")),
        ("qname", FieldSpec::new(ValueKind::Keyword)),
        ("qclass", FieldSpec::new(ValueKind::Keyword)),
        ("qtype", FieldSpec::new(ValueKind::Keyword)),
        ("rcode", FieldSpec::new(ValueKind::Keyword)),
        ("latency_count", FieldSpec::new(ValueKind::Integer)),
        ("latency_mean", FieldSpec::new(ValueKind::Integer)),
        ("latency_max", FieldSpec::new(ValueKind::Integer)),
        ("host", FieldSpec::new(ValueKind::Keyword)),
    ])
});

#[derive(Debug, Clone, Copy, Default)]
pub struct DnsLogSchema;

impl LogSchema for DnsLogSchema {
    type Record = DnsLog;
    type Params = DnsLogParams;

    fn name(&self) -> &'static str {
        "dns"
    }

    fn index(&self) -> LogIndex {
        DNS_LOGS
    }

    fn time_field(&self) -> &'static str {
        "end_time"
    }

    fn time_format(&self) -> TimeFormat {
        TimeFormat::Rfc3339
    }

    fn fields(&self) -> &'static FieldSet {
        &DNS_LOG_FIELDS
    }

    fn rbac(&self) -> RbacStrategy {
        RbacStrategy::ClientNamespace(CLIENT_NAMESPACE_FIELD)
    }

    fn id_of(record: &DnsLog) -> Option<&str> {
        record.id.as_deref()
    }
}
