//! Security events
//!
//! Events are the only log type callers change after the fact: an event can
//! be dismissed (its `dismissed` flag rewritten) or deleted.

use crate::schema::{LogSchema, MutableSchema};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use siftlog_core::records::events::{Event, EventParams};
use siftlog_core::{ClusterInfo, Result};
use siftlog_query::index::EVENTS;
use siftlog_query::{
    FieldSet, FieldSpec, IndexRouter, LogIndex, Query, RbacStrategy, TimeFormat, ValueKind,
};

static EVENT_FIELDS: Lazy<FieldSet> = Lazy::new(|| {
    FieldSet::new(&[
        ("time", FieldSpec::new(ValueKind::EpochSeconds)),
        ("description", FieldSpec::new(ValueKind::Keyword)),
        ("origin", FieldSpec::new(ValueKind::Keyword)),
        ("severity", FieldSpec::new(ValueKind::Integer)),
        ("type", FieldSpec::new(ValueKind::Keyword)),
        ("alert", FieldSpec::new(ValueKind::Keyword)),
        ("source_ip", FieldSpec::new(ValueKind::Ip)),
        ("source_name", FieldSpec::new(ValueKind::Keyword)),
        ("source_namespace", FieldSpec::new(ValueKind::Keyword)),
        ("dest_ip", FieldSpec::new(ValueKind::Ip)),
        ("dest_name", FieldSpec::new(ValueKind::Keyword)),
        ("dest_namespace", FieldSpec::new(ValueKind::Keyword)),
        ("host", FieldSpec::new(ValueKind::Keyword)),
        ("attack_vector", FieldSpec::new(ValueKind::Keyword)),
        ("mitre_ids", FieldSpec::new(ValueKind::Keyword)),
        ("dismissed", FieldSpec::new(ValueKind::Boolean)),
    ])
});

#[derive(Debug, Clone, Copy, Default)]
pub struct EventSchema;

impl LogSchema for EventSchema {
    type Record = Event;
    type Params = EventParams;

    fn name(&self) -> &'static str {
        "events"
    }

    fn index(&self) -> LogIndex {
        EVENTS
    }

    fn time_field(&self) -> &'static str {
        "time"
    }

    fn time_format(&self) -> TimeFormat {
        TimeFormat::EpochSeconds
    }

    fn fields(&self) -> &'static FieldSet {
        &EVENT_FIELDS
    }

    fn rbac(&self) -> RbacStrategy {
        RbacStrategy::Unrestricted
    }

    fn id_of(record: &Event) -> Option<&str> {
        record.id.as_deref()
    }

    fn extra_query(
        &self,
        ci: &ClusterInfo,
        router: &IndexRouter,
        params: &EventParams,
    ) -> Result<Vec<Query>> {
        Ok(match params.id.as_deref() {
            Some(id) if !id.is_empty() => vec![Query::ids([router.document_id(ci, id)])],
            _ => Vec::new(),
        })
    }
}

impl MutableSchema for EventSchema {
    fn update_document(record: &Event) -> Value {
        json!({"dismissed": record.dismissed})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siftlog_query::IndexLayout;

    #[test]
    fn test_id_filter_follows_layout() {
        let ci = ClusterInfo::new("c1").with_tenant("t1");
        let params = EventParams {
            id: Some("e1".into()),
            ..Default::default()
        };
        for layout in IndexLayout::ALL {
            let router = IndexRouter::new(EVENTS, layout);
            let extra = EventSchema.extra_query(&ci, &router, &params).unwrap();
            assert_eq!(extra, vec![Query::ids([router.document_id(&ci, "e1")])]);
        }
        let router = IndexRouter::new(EVENTS, IndexLayout::MultiIndex);
        let none = EventSchema
            .extra_query(&ci, &router, &EventParams::default())
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_update_document_only_carries_dismissed() {
        let event = Event {
            dismissed: true,
            description: "port scan".into(),
            ..Default::default()
        };
        assert_eq!(EventSchema::update_document(&event), json!({"dismissed": true}));
    }
}
