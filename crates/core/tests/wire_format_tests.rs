//! JSON shapes of params and records as callers send them

use serde_json::json;
use siftlog_core::records::audit::{AuditLogParams, AuditLogType};
use siftlog_core::records::events::Event;
use siftlog_core::records::flows::{FlowLog, L3FlowParams};
use siftlog_core::{AggregationParams, LogParams};

#[test]
fn test_l3_params_from_json() {
    let params: L3FlowParams = serde_json::from_value(json!({
        "time_range": {"from": "2024-01-01T00:00:00Z", "to": "2024-01-01T01:00:00Z"},
        "max_page_size": 50,
        "after_key": {"startFrom": 100},
        "selector": "proto = tcp",
        "permissions": [{"resource": "pods", "verb": "list", "namespace": "ns1"}],
        "source": {"type": "wep", "namespace": "ns1"}
    }))
    .unwrap();
    assert_eq!(params.max_page_size(), 50);
    assert_eq!(params.selector(), "proto = tcp");
    assert_eq!(params.permissions().unwrap()[0].namespace.as_deref(), Some("ns1"));
    assert_eq!(params.after_key().unwrap().get("startFrom"), Some(&json!(100)));
    assert!(params.time_range().unwrap().from.is_some());
    assert_eq!(params.source.as_ref().unwrap().kind.as_deref(), Some("wep"));
    assert!(params.destination.is_none());
}

#[test]
fn test_audit_params_type() {
    let params: AuditLogParams = serde_json::from_value(json!({"type": "ee"})).unwrap();
    assert_eq!(params.audit_type, Some(AuditLogType::Ee));
    assert!(serde_json::from_value::<AuditLogParams>(json!({"type": "bogus"})).is_err());
}

#[test]
fn test_aggregation_params_flatten() {
    let params: AggregationParams<AuditLogParams> = serde_json::from_value(json!({
        "type": "kube",
        "aggregations": {"verbs": {"terms": {"field": "verb"}}},
        "num_buckets": 5
    }))
    .unwrap();
    assert_eq!(params.params.audit_type, Some(AuditLogType::Kube));
    assert!(params.aggregations.contains_key("verbs"));
    assert_eq!(params.num_buckets, 5);
}

#[test]
fn test_flow_log_omits_unset_optionals() {
    let json = serde_json::to_value(FlowLog::default()).unwrap();
    for key in ["id", "source_ip", "dest_port", "policies", "generated_time"] {
        assert!(json.get(key).is_none(), "{key} should be omitted");
    }
    assert_eq!(json["bytes_in"], 0);
}

#[test]
fn test_event_type_field() {
    let event: Event = serde_json::from_value(json!({
        "id": "e1", "time": 1700000000, "type": "waf", "severity": 80, "dismissed": true
    }))
    .unwrap();
    assert_eq!(event.kind, "waf");
    assert!(event.dismissed);
    assert!(event.record.is_none());
}
