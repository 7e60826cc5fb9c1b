//! Events, audit logs and WAF logs

mod common;

use chrono::Utc;
use common::*;
use siftlog_backend::{DOCUMENT_MISSING, MISSING_ID};
use siftlog_core::records::audit::{AuditLog, AuditLogParams, AuditLogType, AuditUser};
use siftlog_core::records::events::{Event, EventParams};
use siftlog_core::records::waf::{WafEndpoint, WafLog, WafLogParams};
use siftlog_core::{BulkItem, ClusterInfo, TimeRange};
use siftlog_query::IndexLayout;

fn event(id: &str) -> Event {
    Event {
        id: Some(id.to_string()),
        time: Utc::now().timestamp(),
        description: "suspicious DNS query".into(),
        origin: "dns-detector".into(),
        severity: 70,
        kind: "suspicious_dns_query".into(),
        source_ip: Some("10.0.0.5".into()),
        source_namespace: "default".into(),
        mitre_ids: vec!["T1041".into()],
        ..Default::default()
    }
}

fn event_params() -> EventParams {
    EventParams {
        query_params: recent(),
        ..Default::default()
    }
}

async fn stored_events(h: &Harness, ci: &ClusterInfo) -> Vec<Event> {
    h.store.events.list(ci, &event_params()).await.unwrap().items
}

#[tokio::test]
async fn test_event_id_filter() {
    for layout in IndexLayout::ALL {
        let h = Harness::new(layout);
        let ci = random_cluster();
        h.store
            .events
            .create(&ci, vec![event("e1"), event("e2"), event("e3")])
            .await
            .unwrap();

        let params = EventParams {
            id: Some("e2".into()),
            ..event_params()
        };
        let page = h.store.events.list(&ci, &params).await.unwrap();
        assert_eq!(page.items.len(), 1, "{layout:?}");
        assert_eq!(page.items[0].id.as_deref(), Some("e2"));
        assert_eq!(page.items[0].mitre_ids, vec!["T1041"]);
    }
}

#[tokio::test]
async fn test_dismiss_event() {
    for layout in IndexLayout::ALL {
        let h = Harness::new(layout);
        let ci = random_cluster();
        h.store.events.create(&ci, vec![event("e1"), event("e2")]).await.unwrap();

        let mut dismissed = event("e1");
        dismissed.dismissed = true;
        dismissed.description = "ignored on update".into();
        let resp = h.store.events.update(&ci, vec![dismissed]).await.unwrap();
        assert!(resp.is_complete(), "{:?}", resp.errors);
        assert_eq!(resp.updated, vec![BulkItem { id: "e1".into(), status: 200 }]);

        let events = stored_events(&h, &ci).await;
        let e1 = events.iter().find(|e| e.id.as_deref() == Some("e1")).unwrap();
        assert!(e1.dismissed);
        assert_eq!(e1.description, "suspicious DNS query");
        let e2 = events.iter().find(|e| e.id.as_deref() == Some("e2")).unwrap();
        assert!(!e2.dismissed);
    }
}

#[tokio::test]
async fn test_delete_event() {
    for layout in IndexLayout::ALL {
        let h = Harness::new(layout);
        let ci = random_cluster();
        h.store.events.create(&ci, vec![event("e1"), event("e2")]).await.unwrap();

        let resp = h.store.events.delete(&ci, vec![event("e2")]).await.unwrap();
        assert_eq!(resp.deleted, vec![BulkItem { id: "e2".into(), status: 200 }]);

        let ids: Vec<_> = stored_events(&h, &ci).await.into_iter().filter_map(|e| e.id).collect();
        assert_eq!(ids, vec!["e1"]);
    }
}

#[tokio::test]
async fn test_mutations_cannot_cross_tenants() {
    for layout in IndexLayout::ALL {
        let h = Harness::new(layout);
        let owner = ClusterInfo::new("c1").with_tenant("owner");
        let intruder = ClusterInfo::new("c1").with_tenant("intruder");
        h.store.events.create(&owner, vec![event("e1")]).await.unwrap();

        let mut dismissed = event("e1");
        dismissed.dismissed = true;
        let resp = h.store.events.update(&intruder, vec![dismissed]).await.unwrap();
        assert_eq!(resp.failed, 1);
        assert_eq!(resp.errors[0].kind, DOCUMENT_MISSING);
        assert_eq!(resp.errors[0].resource, "e1");

        let resp = h.store.events.delete(&intruder, vec![event("e1")]).await.unwrap();
        assert_eq!(resp.errors[0].kind, DOCUMENT_MISSING);

        let events = stored_events(&h, &owner).await;
        assert_eq!(events.len(), 1, "{layout:?}");
        assert!(!events[0].dismissed);
    }
}

#[tokio::test]
async fn test_mutation_without_id() {
    for layout in IndexLayout::ALL {
        let h = Harness::new(layout);
        let ci = random_cluster();
        h.store.events.create(&ci, vec![event("e1")]).await.unwrap();

        let mut anonymous = event("x");
        anonymous.id = None;
        let resp = h
            .store
            .events
            .delete(&ci, vec![anonymous, event("e1"), event("gone")])
            .await
            .unwrap();
        assert_eq!(resp.total, 3);
        assert_eq!(resp.succeeded, 1);
        let kinds: Vec<_> = resp.errors.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec![MISSING_ID, DOCUMENT_MISSING]);
    }
}

#[tokio::test]
async fn test_events_filtered_on_generated_time() {
    for layout in IndexLayout::ALL {
        let h = Harness::new(layout);
        let ci = random_cluster();
        let mut old = event("old");
        old.time -= 7 * 24 * 3600;
        h.store.events.create(&ci, vec![old]).await.unwrap();

        let since = Utc::now() - chrono::Duration::minutes(10);
        let params = EventParams {
            query_params: siftlog_core::QueryParams::default()
                .with_time_range(TimeRange::since(since).on_field("generated_time")),
            ..Default::default()
        };
        let page = h.store.events.list(&ci, &params).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(stored_events(&h, &ci).await.is_empty());
    }
}

// ============================================================================
// Audit
// ============================================================================

fn audit_log(id: &str, verb: &str) -> AuditLog {
    AuditLog {
        id: Some(id.to_string()),
        audit_id: format!("audit-{id}"),
        level: "Metadata".into(),
        stage: "ResponseComplete".into(),
        verb: verb.to_string(),
        request_uri: "/api/v1/namespaces/default/pods".into(),
        user: AuditUser {
            username: "alice".into(),
            groups: vec!["system:authenticated".into()],
        },
        request_received_timestamp: Some(Utc::now()),
        stage_timestamp: Some(Utc::now()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_audit_subtypes_are_separate() {
    for layout in IndexLayout::ALL {
        let h = Harness::new(layout);
        let ci = random_cluster();
        h.store
            .audit
            .create(AuditLogType::Kube, &ci, vec![audit_log("k1", "list"), audit_log("k2", "get")])
            .await
            .unwrap();
        h.store
            .audit
            .create(AuditLogType::Ee, &ci, vec![audit_log("x1", "create")])
            .await
            .unwrap();

        let mut params = AuditLogParams {
            query_params: recent(),
            audit_type: Some(AuditLogType::Kube),
            ..Default::default()
        };
        let kube = h.store.audit.list(&ci, &params).await.unwrap();
        assert_eq!(kube.items.len(), 2, "{layout:?}");
        assert_eq!(kube.items[0].audit_id, "audit-k1");
        assert_eq!(kube.items[0].user.username, "alice");

        params.audit_type = Some(AuditLogType::Ee);
        let ee = h.store.audit.list(&ci, &params).await.unwrap();
        assert_eq!(ee.items.len(), 1);
        assert_eq!(ee.items[0].verb, "create");

        params.audit_type = None;
        assert!(h.store.audit.list(&ci, &params).await.unwrap_err().is_validation());
    }
}

#[tokio::test]
async fn test_audit_selector_on_nested_object() {
    for layout in IndexLayout::ALL {
        let h = Harness::new(layout);
        let ci = random_cluster();
        let mut bob = audit_log("k2", "delete");
        bob.user.username = "bob".into();
        h.store
            .audit
            .create(AuditLogType::Kube, &ci, vec![audit_log("k1", "list"), bob])
            .await
            .unwrap();

        let mut params = AuditLogParams {
            query_params: recent(),
            audit_type: Some(AuditLogType::Kube),
            ..Default::default()
        };
        params.selection.selector = "user.username = \"bob\"".into();
        let page = h.store.audit.list(&ci, &params).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].verb, "delete");
    }
}

// ============================================================================
// WAF
// ============================================================================

#[tokio::test]
async fn test_waf_round_trip() {
    for layout in IndexLayout::ALL {
        let h = Harness::new(layout);
        let ci = random_cluster();
        let log = WafLog {
            id: Some("w1".into()),
            timestamp: Some(Utc::now()),
            source: WafEndpoint {
                hostname: "client".into(),
                ip: "10.0.0.3".into(),
                port_num: 51000,
            },
            destination: WafEndpoint {
                hostname: String::new(),
                ip: String::new(),
                port_num: 80,
            },
            path: "/login".into(),
            method: "POST".into(),
            msg: "SQL injection attempt".into(),
            ..Default::default()
        };
        let resp = h.store.waf.create(&ci, vec![log.clone()]).await.unwrap();
        assert!(resp.is_complete(), "{:?}", resp.errors);

        let params = WafLogParams {
            query_params: recent(),
            ..Default::default()
        };
        let page = h.store.waf.list(&ci, &params).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, log.id);
        assert_eq!(page.items[0].source, log.source);
        assert_eq!(page.items[0].msg, log.msg);
    }
}
