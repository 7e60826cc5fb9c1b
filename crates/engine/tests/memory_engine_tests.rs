//! Behavioral tests for the in-process document engine
//!
//! These exercise the engine only through the `DocumentEngine` trait, the
//! same way the backend uses it:
//!
//! 1. **Provisioning** - templates, bootstrap index, write alias
//! 2. **Bulk writes** - per-item failures never fail the request
//! 3. **Search** - sort order, result window, search_after under a PIT
//! 4. **Aggregations** - composite paging across requests

use serde_json::{json, Value};
use siftlog_engine::{
    BulkOperation, BulkRequest, CreateIndex, DocumentEngine, EngineError, IndexTemplate,
    MemoryEngine, PointInTime, SearchRequest,
};
use siftlog_query::{
    Aggregation, CompositeSource, Query, RangeQuery, SortField, SortOrder, SubAggregations,
};

// ============================================================================
// Test Helpers
// ============================================================================

const ALIAS: &str = "logs.c1";
const PATTERN: &str = "logs.c1.*";

async fn provisioned(engine: &MemoryEngine) {
    engine
        .put_index_template(IndexTemplate {
            name: ALIAS.into(),
            patterns: vec![PATTERN.into()],
            settings: json!({}),
            mappings: json!({"properties": {
                "source_ip": {"type": "ip"},
                "seq": {"type": "long"},
                "proto": {"type": "keyword"}
            }}),
        })
        .await
        .unwrap();
    engine
        .create_index(CreateIndex {
            name: format!("{ALIAS}.000001"),
            write_alias: Some(ALIAS.into()),
        })
        .await
        .unwrap();
}

async fn seed(engine: &MemoryEngine, n: usize) {
    let ops = (0..n)
        .map(|i| {
            BulkOperation::index(
                ALIAS,
                Some(format!("doc-{i:03}")),
                json!({"seq": i, "proto": if i % 2 == 0 { "tcp" } else { "udp" }, "bytes": 10}),
            )
        })
        .collect();
    let result = engine.bulk(BulkRequest::new(ops)).await.unwrap();
    assert!(!result.errors);
}

fn seqs(hits: &[siftlog_engine::Hit]) -> Vec<i64> {
    hits.iter().map(|h| h.source["seq"].as_i64().unwrap()).collect()
}

// ============================================================================
// Provisioning
// ============================================================================

#[tokio::test]
async fn test_second_bootstrap_reports_already_exists() {
    let engine = MemoryEngine::new();
    provisioned(&engine).await;
    let err = engine
        .create_index(CreateIndex {
            name: format!("{ALIAS}.000001"),
            write_alias: Some(ALIAS.into()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_writes_through_alias_land_in_backing_index() {
    let engine = MemoryEngine::new();
    provisioned(&engine).await;
    seed(&engine, 3).await;
    assert_eq!(engine.document_count(PATTERN), 3);
    assert_eq!(engine.index_names(), vec![format!("{ALIAS}.000001")]);
}

// ============================================================================
// Bulk writes
// ============================================================================

#[tokio::test]
async fn test_bulk_partial_failure() {
    let engine = MemoryEngine::new();
    provisioned(&engine).await;
    let result = engine
        .bulk(BulkRequest::new(vec![
            BulkOperation::index(ALIAS, None, json!({"source_ip": "10.0.0.1"})),
            BulkOperation::index(ALIAS, None, json!({"source_ip": "garbage"})),
            BulkOperation::index(ALIAS, Some("x".into()), json!({"seq": 1})),
            BulkOperation::index(ALIAS, Some("x".into()), json!({"seq": 2})),
        ]))
        .await
        .unwrap();
    assert!(result.errors);
    let statuses: Vec<u16> = result.items.iter().map(|i| i.status).collect();
    assert_eq!(statuses, vec![201, 400, 201, 200]);
    assert_eq!(
        result.items[1].error.as_ref().unwrap().kind,
        "mapper_parsing_exception"
    );
    assert_eq!(engine.document_count(ALIAS), 2);
}

#[tokio::test]
async fn test_update_and_delete() {
    let engine = MemoryEngine::new();
    provisioned(&engine).await;
    seed(&engine, 2).await;
    let index = format!("{ALIAS}.000001");
    let result = engine
        .bulk(BulkRequest::new(vec![
            BulkOperation::update(&index, "doc-000", json!({"dismissed": true})),
            BulkOperation::update(&index, "missing", json!({"dismissed": true})),
            BulkOperation::delete(&index, "doc-001"),
        ]))
        .await
        .unwrap();
    assert!(result.items[0].is_success());
    assert_eq!(result.items[1].status, 404);
    assert_eq!(
        result.items[1].error.as_ref().unwrap().kind,
        "document_missing_exception"
    );
    assert!(result.items[2].is_success());
    let doc = engine.get_document(&index, "doc-000").unwrap();
    assert_eq!(doc["dismissed"], true);
    assert_eq!(doc["seq"], 0);
    assert!(engine.get_document(&index, "doc-001").is_none());
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_filters_sorts_and_counts() {
    let engine = MemoryEngine::new();
    provisioned(&engine).await;
    seed(&engine, 10).await;
    let query = Query::all_of(vec![
        Query::term("proto", "tcp"),
        Query::Range(RangeQuery::new("seq").gt(0)),
    ]);
    let resp = engine
        .search(
            SearchRequest::new(PATTERN, query)
                .size(2)
                .sort(vec![SortField::desc("seq")]),
        )
        .await
        .unwrap();
    assert_eq!(resp.total_hits, 4);
    assert_eq!(seqs(&resp.hits), vec![8, 6]);
}

#[tokio::test]
async fn test_missing_index_is_ignored() {
    let engine = MemoryEngine::new();
    let resp = engine
        .search(SearchRequest::new("nothing.*", Query::MatchAll))
        .await
        .unwrap();
    assert_eq!(resp.total_hits, 0);
    assert!(resp.hits.is_empty());
}

#[tokio::test]
async fn test_result_window_enforced() {
    let engine = MemoryEngine::new().with_max_result_window(5);
    provisioned(&engine).await;
    seed(&engine, 10).await;
    let err = engine
        .search(SearchRequest::new(PATTERN, Query::MatchAll).offset(4).size(2))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("Result window is too large"));
}

#[tokio::test]
async fn test_point_in_time_pages_past_window() {
    let engine = MemoryEngine::new().with_max_result_window(5);
    provisioned(&engine).await;
    seed(&engine, 12).await;
    let pit_id = engine.open_point_in_time(PATTERN, "1m").await.unwrap();
    // Writes after the PIT opened are not part of the traversal
    seed_extra(&engine).await;

    let mut seen = Vec::new();
    let mut after: Option<Vec<Value>> = None;
    loop {
        let mut request = SearchRequest::new("", Query::MatchAll)
            .size(5)
            .sort(vec![SortField::asc("proto")])
            .point_in_time(PointInTime {
                id: pit_id.clone(),
                keep_alive: "1m".into(),
            });
        if let Some(values) = after.take() {
            request = request.search_after(values);
        }
        let resp = engine.search(request).await.unwrap();
        assert_eq!(resp.total_hits, 12);
        assert_eq!(resp.pit_id.as_deref(), Some(pit_id.as_str()));
        seen.extend(seqs(&resp.hits));
        match resp.hits.last() {
            Some(last) if resp.hits.len() == 5 => after = Some(last.sort.clone()),
            _ => break,
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..12).collect::<Vec<_>>());

    engine.close_point_in_time(&pit_id).await.unwrap();
    assert_eq!(engine.open_pit_count(), 0);
    let err = engine.close_point_in_time(&pit_id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

async fn seed_extra(engine: &MemoryEngine) {
    engine
        .bulk(BulkRequest::new(vec![BulkOperation::index(
            ALIAS,
            Some("late".into()),
            json!({"seq": 99, "proto": "tcp"}),
        )]))
        .await
        .unwrap();
}

// ============================================================================
// Aggregations
// ============================================================================

#[tokio::test]
async fn test_composite_paging() {
    let engine = MemoryEngine::new();
    provisioned(&engine).await;
    seed(&engine, 6).await;
    let agg = |after: Option<serde_json::Map<String, Value>>| Aggregation::Composite {
        size: 1,
        sources: vec![CompositeSource {
            name: "proto".into(),
            field: "proto".into(),
            order: SortOrder::Asc,
            missing_bucket: false,
        }],
        after,
        aggs: {
            let mut sub = SubAggregations::new();
            sub.insert("bytes".into(), Aggregation::Sum { field: "bytes".into() });
            sub
        },
    };

    let request = |after: Option<serde_json::Map<String, Value>>| {
        SearchRequest::new(PATTERN, Query::MatchAll)
            .size(0)
            .aggregation("flows", agg(after))
    };
    let first = engine.search(request(None)).await.unwrap();
    assert!(first.hits.is_empty());
    let flows = &first.aggregations["flows"];
    assert_eq!(flows["buckets"][0]["key"]["proto"], "tcp");
    assert_eq!(flows["buckets"][0]["doc_count"], 3);
    assert_eq!(flows["buckets"][0]["bytes"]["value"], 30.0);

    let after = flows["after_key"].as_object().cloned();
    let second = engine.search(request(after)).await.unwrap();
    assert_eq!(second.aggregations["flows"]["buckets"][0]["key"]["proto"], "udp");
}
