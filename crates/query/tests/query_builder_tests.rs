//! Composition of tenancy, time, RBAC and selector clauses

use once_cell::sync::Lazy;
use serde_json::json;
use siftlog_core::{
    ClusterInfo, LogSelectionParams, Permission, QueryParams, SortBy, TimeRange,
    QUERY_MULTIPLE_CLUSTERS,
};
use siftlog_query::index::FLOW_LOGS;
use siftlog_query::{
    FieldSet, FieldSpec, IndexLayout, IndexRouter, Query, QueryHelper, RbacStrategy, TimeFormat,
    ValueKind,
};

static FIELDS: Lazy<FieldSet> = Lazy::new(|| {
    FieldSet::new(&[
        ("end_time", FieldSpec::new(ValueKind::EpochSeconds)),
        ("proto", FieldSpec::new(ValueKind::Keyword)),
        ("dest_port", FieldSpec::new(ValueKind::Integer)),
        ("source_type", FieldSpec::new(ValueKind::OneOf(&["wep", "hep", "ns", "net"]))),
        ("source_namespace", FieldSpec::new(ValueKind::Keyword)),
        ("dest_type", FieldSpec::new(ValueKind::OneOf(&["wep", "hep", "ns", "net"]))),
        ("dest_namespace", FieldSpec::new(ValueKind::Keyword)),
        ("dest_labels.labels", FieldSpec::nested(ValueKind::Keyword, "dest_labels")),
    ])
});

fn helper(layout: IndexLayout) -> QueryHelper {
    QueryHelper::new(
        IndexRouter::new(FLOW_LOGS, layout),
        "end_time",
        TimeFormat::EpochSeconds,
        &FIELDS,
        RbacStrategy::Endpoints,
    )
}

struct Params {
    query: QueryParams,
    selection: LogSelectionParams,
    sort: Vec<SortBy>,
}

impl siftlog_core::LogParams for Params {
    fn query_params(&self) -> &QueryParams {
        &self.query
    }

    fn selection(&self) -> Option<&LogSelectionParams> {
        Some(&self.selection)
    }

    fn sort_by(&self) -> &[SortBy] {
        &self.sort
    }
}

fn params(selector: &str, permissions: Option<Vec<Permission>>) -> Params {
    let from = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let to = chrono::DateTime::from_timestamp(1_700_000_600, 0).unwrap();
    Params {
        query: QueryParams::default().with_time_range(TimeRange::between(from, to)),
        selection: LogSelectionParams {
            selector: selector.to_string(),
            permissions,
        },
        sort: Vec::new(),
    }
}

#[test]
fn test_full_query_shape() {
    let ci = ClusterInfo::new("c1").with_tenant("t1");
    let p = params(
        "proto = tcp AND dest_labels.labels = \"app=web\"",
        Some(vec![Permission::namespaced("", "pods", "ns1")]),
    );
    let q = helper(IndexLayout::MultiIndex).build_query(&ci, &p, vec![]).unwrap().to_json();
    let filter = q["bool"]["filter"].as_array().unwrap();
    assert_eq!(filter[0], json!({"term": {"cluster": {"value": "c1"}}}));
    assert_eq!(filter[1], json!({"term": {"tenant": {"value": "t1"}}}));
    assert_eq!(
        filter[2],
        json!({"range": {"end_time": {"gt": 1_700_000_000, "lte": 1_700_000_600}}})
    );
    assert!(filter[3]["bool"]["should"].is_array(), "rbac clause: {}", filter[3]);

    let must = q["bool"]["must"].as_array().unwrap();
    assert_eq!(must.len(), 1);
    let selector = must[0].to_string();
    assert!(selector.contains("\"nested\""), "{selector}");
    assert!(selector.contains("app=web"), "{selector}");
}

#[test]
fn test_untenanted_read_excludes_tenant_documents() {
    let ci = ClusterInfo::new("c1");
    let p = params("", None);
    let q = helper(IndexLayout::SingleIndex).build_query(&ci, &p, vec![]).unwrap().to_json();
    assert_eq!(
        q["bool"]["filter"][1],
        Query::none_of(vec![Query::exists("tenant")]).to_json()
    );
    assert!(q["bool"].get("must").map(|m| m.as_array().unwrap().is_empty()).unwrap_or(true));
}

#[test]
fn test_multi_cluster_selection() {
    let ci = ClusterInfo::new(QUERY_MULTIPLE_CLUSTERS).with_tenant("t1");
    let mut p = params("", None);
    p.query = p.query.with_clusters(vec!["east".into(), "west".into()]);
    let q = helper(IndexLayout::SingleIndex).build_query(&ci, &p, vec![]).unwrap().to_json();
    assert_eq!(q["bool"]["filter"][0], json!({"terms": {"cluster": ["east", "west"]}}));

    let router = IndexRouter::new(FLOW_LOGS, IndexLayout::MultiIndex);
    let pattern = router.read_pattern(&ci, &["east".into(), "west".into()]).unwrap();
    assert_eq!(pattern.split(',').count(), 2);
    assert!(router.read_pattern(&ci, &["e*".into()]).is_err());
}

#[test]
fn test_extra_clauses_are_required() {
    let ci = ClusterInfo::new("c1");
    let p = params("", None);
    let extra = vec![Query::term("dest_namespace", "kube-system")];
    let q = helper(IndexLayout::MultiIndex).build_query(&ci, &p, extra).unwrap().to_json();
    assert_eq!(q["bool"]["must"][0], json!({"term": {"dest_namespace": {"value": "kube-system"}}}));
}

#[test]
fn test_selector_errors() {
    let ci = ClusterInfo::new("c1");
    let h = helper(IndexLayout::MultiIndex);
    for bad in ["proto =", "unknown = 1", "dest_port = eighty", "source_type = pod"] {
        let err = h.build_query(&ci, &params(bad, None), vec![]).unwrap_err();
        assert!(err.is_validation(), "{bad}: {err}");
    }
}

#[test]
fn test_sort_validation() {
    let h = helper(IndexLayout::MultiIndex);
    let mut p = params("", None);
    assert_eq!(h.sort(&p).unwrap()[0].field, "end_time");

    p.sort = vec![SortBy::desc("dest_port"), SortBy::asc("generated_time")];
    let sort = h.sort(&p).unwrap();
    assert!(sort[0].descending);
    assert_eq!(sort[1].field, "generated_time");

    p.sort = vec![SortBy::asc("dest_labels.labels")];
    assert!(h.sort(&p).is_err());
}
