//! Web application firewall logs

use crate::schema::LogSchema;
use once_cell::sync::Lazy;
use siftlog_core::records::waf::{WafLog, WafLogParams};
use siftlog_query::index::WAF_LOGS;
use siftlog_query::{FieldSet, FieldSpec, LogIndex, RbacStrategy, TimeFormat, ValueKind};

static WAF_LOG_FIELDS: Lazy<FieldSet> = Lazy::new(|| {
    FieldSet::new(&[
        ("@timestamp", FieldSpec::new(ValueKind::Date)),
        ("unique_id", FieldSpec::new(ValueKind::Keyword)),
        ("request_id", FieldSpec::new(ValueKind::Keyword)),
        ("source.hostname", FieldSpec::new(ValueKind::Keyword)),
        ("source.ip", FieldSpec::new(ValueKind::Keyword)),
        ("source.port_num", FieldSpec::new(ValueKind::Integer)),
        ("destination.hostname", FieldSpec::new(ValueKind::Keyword)),
        ("destination.ip", FieldSpec::new(ValueKind::Keyword)),
        ("destination.port_num", FieldSpec::new(ValueKind::Integer)),
        ("path", FieldSpec::new(ValueKind::Keyword)),
        ("method", FieldSpec::new(ValueKind::Keyword)),
        ("protocol", FieldSpec::new(ValueKind::Keyword)),
        ("msg", FieldSpec::new(ValueKind::Keyword)),
        ("rules.id", FieldSpec::new(ValueKind::Keyword)),
        ("rules.message", FieldSpec::new(ValueKind::Keyword)),
        ("rules.severity", FieldSpec::new(ValueKind::Keyword)),
        ("rules.file", FieldSpec::new(ValueKind::Keyword)),
        ("rules.line", FieldSpec::new(ValueKind::Keyword)),
        ("host", FieldSpec::new(ValueKind::Keyword)),
        ("level", FieldSpec::new(ValueKind::Keyword)),
    ])
});

#[derive(Debug, Clone, Copy, Default)]
pub struct WafLogSchema;

impl LogSchema for WafLogSchema {
    type Record = WafLog;
    type Params = WafLogParams;

    fn name(&self) -> &'static str {
        "waf"
    }

    fn index(&self) -> LogIndex {
        WAF_LOGS
    }

    fn time_field(&self) -> &'static str {
        "@timestamp"
    }

    fn time_format(&self) -> TimeFormat {
        TimeFormat::Rfc3339
    }

    fn fields(&self) -> &'static FieldSet {
        &WAF_LOG_FIELDS
    }

    fn rbac(&self) -> RbacStrategy {
        RbacStrategy::Unrestricted
    }

    fn id_of(record: &WafLog) -> Option<&str> {
        record.id.as_deref()
    }
}
