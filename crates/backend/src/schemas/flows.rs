//! Flow logs and aggregated L3 flows
//!
//! Raw flow logs are stored and listed through
//! [`LogBackend<FlowLogSchema>`](crate::backend::LogBackend). [`FlowBackend`]
//! reads the same documents back as L3 flows: one composite bucket per
//! distinct (endpoints, service, protocol, process, reporter, action) tuple
//! with summed traffic and TCP statistics.

use crate::backend::with_deadline;
use crate::composite::{
    paged_search, CompositeAggregationBucket, CompositeAggregationQuery, FieldTracker, MeanInfo,
    MetricInfo, NestedTermInfo,
};
use crate::config::StorageConfig;
use crate::schema::LogSchema;
use once_cell::sync::Lazy;
use siftlog_core::records::flows::{
    Endpoint, EndpointFilter, FlowLabelValue, FlowLabels, FlowLog, FlowLogParams, L3Flow, L3FlowKey,
    L3FlowParams, LogStats, Process, ProcessStats, Service, TcpStats, TrafficStats,
};
use siftlog_core::{resolve_page_size, ClusterInfo, List, LogParams, Result};
use siftlog_engine::DocumentEngine;
use siftlog_query::index::FLOW_LOGS;
use siftlog_query::{
    CompositeSource, FieldSet, FieldSpec, IndexRouter, LogIndex, Query, QueryHelper, RbacStrategy,
    SortOrder, TimeFormat, ValueKind,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

const ENDPOINT_TYPES: &[&str] = &["wep", "hep", "ns", "net"];
const ACTIONS: &[&str] = &["allow", "deny"];
const REPORTERS: &[&str] = &["src", "dst"];

static FLOW_LOG_FIELDS: Lazy<FieldSet> = Lazy::new(|| {
    FieldSet::new(&[
        ("start_time", FieldSpec::new(ValueKind::EpochSeconds)),
        ("end_time", FieldSpec::new(ValueKind::EpochSeconds)),
        ("source_ip", FieldSpec::new(ValueKind::Ip)),
        ("source_name", FieldSpec::new(ValueKind::Keyword)),
        ("source_name_aggr", FieldSpec::new(ValueKind::Keyword)),
        ("source_namespace", FieldSpec::new(ValueKind::Keyword)),
        ("source_port", FieldSpec::new(ValueKind::Integer)),
        ("source_type", FieldSpec::new(ValueKind::OneOf(ENDPOINT_TYPES))),
        ("source_labels.labels", FieldSpec::nested(ValueKind::Keyword, "source_labels")),
        ("dest_ip", FieldSpec::new(ValueKind::Ip)),
        ("dest_name", FieldSpec::new(ValueKind::Keyword)),
        ("dest_name_aggr", FieldSpec::new(ValueKind::Keyword)),
        ("dest_namespace", FieldSpec::new(ValueKind::Keyword)),
        ("dest_port", FieldSpec::new(ValueKind::Integer)),
        ("dest_type", FieldSpec::new(ValueKind::OneOf(ENDPOINT_TYPES))),
        ("dest_labels.labels", FieldSpec::nested(ValueKind::Keyword, "dest_labels")),
        ("dest_service_namespace", FieldSpec::new(ValueKind::Keyword)),
        ("dest_service_name", FieldSpec::new(ValueKind::Keyword)),
        ("dest_service_port", FieldSpec::new(ValueKind::Keyword)),
        ("dest_service_port_num", FieldSpec::new(ValueKind::Integer)),
        ("proto", FieldSpec::new(ValueKind::Keyword)),
        ("action", FieldSpec::new(ValueKind::OneOf(ACTIONS))),
        ("reporter", FieldSpec::new(ValueKind::OneOf(REPORTERS))),
        ("policies.all_policies", FieldSpec::nested(ValueKind::Keyword, "policies")),
        ("bytes_in", FieldSpec::new(ValueKind::Integer)),
        ("bytes_out", FieldSpec::new(ValueKind::Integer)),
        ("packets_in", FieldSpec::new(ValueKind::Integer)),
        ("packets_out", FieldSpec::new(ValueKind::Integer)),
        ("num_flows", FieldSpec::new(ValueKind::Integer)),
        ("num_flows_started", FieldSpec::new(ValueKind::Integer)),
        ("num_flows_completed", FieldSpec::new(ValueKind::Integer)),
        ("http_requests_allowed_in", FieldSpec::new(ValueKind::Integer)),
        ("http_requests_denied_in", FieldSpec::new(ValueKind::Integer)),
        ("process_name", FieldSpec::new(ValueKind::Keyword)),
        ("process_id", FieldSpec::new(ValueKind::Keyword)),
        ("num_process_names", FieldSpec::new(ValueKind::Integer)),
        ("num_process_ids", FieldSpec::new(ValueKind::Integer)),
        ("tcp_mean_send_congestion_window", FieldSpec::new(ValueKind::Integer)),
        ("tcp_min_send_congestion_window", FieldSpec::new(ValueKind::Integer)),
        ("tcp_mean_smooth_rtt", FieldSpec::new(ValueKind::Integer)),
        ("tcp_max_smooth_rtt", FieldSpec::new(ValueKind::Integer)),
        ("tcp_mean_min_rtt", FieldSpec::new(ValueKind::Integer)),
        ("tcp_max_min_rtt", FieldSpec::new(ValueKind::Integer)),
        ("tcp_mean_mss", FieldSpec::new(ValueKind::Integer)),
        ("tcp_min_mss", FieldSpec::new(ValueKind::Integer)),
        ("tcp_total_retransmissions", FieldSpec::new(ValueKind::Integer)),
        ("tcp_lost_packets", FieldSpec::new(ValueKind::Integer)),
        ("tcp_unrecovered_to", FieldSpec::new(ValueKind::Integer)),
        ("host", FieldSpec::new(ValueKind::Keyword)),
    ])
});

// ============================================================================
// Raw flow logs
// ============================================================================

/// Flow logs as written by node agents
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowLogSchema;

impl LogSchema for FlowLogSchema {
    type Record = FlowLog;
    type Params = FlowLogParams;

    fn name(&self) -> &'static str {
        "flows"
    }

    fn index(&self) -> LogIndex {
        FLOW_LOGS
    }

    fn time_field(&self) -> &'static str {
        "end_time"
    }

    fn time_format(&self) -> TimeFormat {
        TimeFormat::EpochSeconds
    }

    fn fields(&self) -> &'static FieldSet {
        &FLOW_LOG_FIELDS
    }

    fn rbac(&self) -> RbacStrategy {
        RbacStrategy::Endpoints
    }

    fn id_of(record: &FlowLog) -> Option<&str> {
        record.id.as_deref()
    }
}

// ============================================================================
// L3 flows
// ============================================================================

pub const AGG_SUM_NUM_FLOWS: &str = "sum_num_flows";
pub const AGG_SUM_NUM_FLOWS_STARTED: &str = "sum_num_flows_started";
pub const AGG_SUM_NUM_FLOWS_COMPLETED: &str = "sum_num_flows_completed";
pub const AGG_SUM_PACKETS_IN: &str = "sum_packets_in";
pub const AGG_SUM_BYTES_IN: &str = "sum_bytes_in";
pub const AGG_SUM_PACKETS_OUT: &str = "sum_packets_out";
pub const AGG_SUM_BYTES_OUT: &str = "sum_bytes_out";
pub const AGG_SUM_TCP_RETRANSMISSIONS: &str = "sum_tcp_total_retransmissions";
pub const AGG_SUM_TCP_LOST_PACKETS: &str = "sum_tcp_lost_packets";
pub const AGG_SUM_TCP_UNRECOVERED_TO: &str = "sum_tcp_unrecovered_to";
pub const AGG_MIN_PROCESS_NAMES: &str = "process_names_min_num";
pub const AGG_MIN_PROCESS_IDS: &str = "process_ids_min_num";
pub const AGG_MIN_TCP_SEND_CONGESTION_WINDOW: &str = "tcp_min_send_congestion_window";
pub const AGG_MIN_TCP_MSS: &str = "tcp_min_mss";
pub const AGG_MAX_PROCESS_NAMES: &str = "process_names_max_num";
pub const AGG_MAX_PROCESS_IDS: &str = "process_ids_max_num";
pub const AGG_MAX_TCP_SMOOTH_RTT: &str = "tcp_max_smooth_rtt";
pub const AGG_MAX_TCP_MIN_RTT: &str = "tcp_max_min_rtt";
pub const AGG_MEAN_TCP_SEND_CONGESTION_WINDOW: &str = "tcp_mean_send_congestion_window";
pub const AGG_MEAN_TCP_SMOOTH_RTT: &str = "tcp_mean_smooth_rtt";
pub const AGG_MEAN_TCP_MIN_RTT: &str = "tcp_mean_min_rtt";
pub const AGG_MEAN_TCP_MSS: &str = "tcp_mean_mss";

const BUCKETS_NAME: &str = "buckets";
const LABEL_TERM: &str = "by_kvpair";

fn flow_source(name: &str, field: &str, order: SortOrder, missing_bucket: bool) -> CompositeSource {
    CompositeSource {
        name: name.to_string(),
        field: field.to_string(),
        order,
        missing_bucket,
    }
}

fn composite_sources() -> Vec<CompositeSource> {
    use SortOrder::{Asc, Desc};
    vec![
        flow_source("cluster", "cluster", Asc, false),
        flow_source("dest_type", "dest_type", Asc, false),
        flow_source("dest_namespace", "dest_namespace", Asc, false),
        flow_source("dest_name_aggr", "dest_name_aggr", Asc, false),
        flow_source("dest_service_namespace", "dest_service_namespace", Desc, false),
        flow_source("dest_service_name", "dest_service_name", Asc, false),
        flow_source("dest_service_port_name", "dest_service_port", Asc, false),
        flow_source("dest_service_port_num", "dest_service_port_num", Asc, true),
        flow_source("proto", "proto", Asc, false),
        flow_source("dest_port_num", "dest_port", Asc, true),
        flow_source("source_type", "source_type", Asc, false),
        flow_source("source_namespace", "source_namespace", Asc, false),
        flow_source("source_name_aggr", "source_name_aggr", Asc, false),
        flow_source("process_name", "process_name", Asc, false),
        flow_source("reporter", "reporter", Asc, false),
        flow_source("action", "action", Asc, false),
    ]
}

fn metrics(pairs: &[(&str, &str)]) -> Vec<MetricInfo> {
    pairs.iter().map(|(name, field)| MetricInfo::new(*name, *field)).collect()
}

fn label_terms(name: &str) -> NestedTermInfo {
    NestedTermInfo {
        name: name.to_string(),
        path: name.to_string(),
        term: LABEL_TERM.to_string(),
        field: format!("{name}.labels"),
    }
}

/// Reads flow logs back as aggregated L3 flows
pub struct FlowBackend {
    engine: Arc<dyn DocumentEngine>,
    helper: QueryHelper,
    tracker: FieldTracker,
    storage: StorageConfig,
}

impl FlowBackend {
    pub fn new(engine: Arc<dyn DocumentEngine>, storage: &StorageConfig) -> Self {
        let helper = FlowLogSchema.query_helper(IndexRouter::new(FLOW_LOGS, storage.layout()));
        FlowBackend {
            engine,
            helper,
            tracker: FieldTracker::new(&composite_sources()),
            storage: storage.clone(),
        }
    }

    /// One page of L3 flows matching `params`
    pub async fn list(&self, ci: &ClusterInfo, params: &L3FlowParams) -> Result<List<L3Flow>> {
        with_deadline(params.timeout(), self.list_page(ci, params))
            .instrument(ci.span("l3flows"))
            .await
    }

    async fn list_page(&self, ci: &ClusterInfo, params: &L3FlowParams) -> Result<List<L3Flow>> {
        ci.valid()?;
        let size = resolve_page_size(params.max_page_size(), self.storage.default_page_size)?;
        let index = self.helper.router().read_pattern(ci, params.clusters())?;
        let query = self.helper.build_query(ci, params, endpoint_filters(params))?;
        let query = self.query(index, query).with_max_buckets(size);
        debug!(index = %query.index, size, "listing L3 flows");

        let (items, after_key) = paged_search(
            self.engine.as_ref(),
            &query,
            params.after_key(),
            |bucket| Some(self.convert_bucket(bucket)),
        )
        .await?;
        Ok(List {
            items,
            total_hits: 0,
            after_key,
        })
    }

    fn query(&self, index: String, query: Query) -> CompositeAggregationQuery {
        CompositeAggregationQuery::new(index, query, BUCKETS_NAME, composite_sources())
            .with_sums(metrics(&[
                (AGG_SUM_NUM_FLOWS, "num_flows"),
                (AGG_SUM_NUM_FLOWS_STARTED, "num_flows_started"),
                (AGG_SUM_NUM_FLOWS_COMPLETED, "num_flows_completed"),
                (AGG_SUM_PACKETS_IN, "packets_in"),
                (AGG_SUM_BYTES_IN, "bytes_in"),
                (AGG_SUM_PACKETS_OUT, "packets_out"),
                (AGG_SUM_BYTES_OUT, "bytes_out"),
                (AGG_SUM_TCP_RETRANSMISSIONS, "tcp_total_retransmissions"),
                (AGG_SUM_TCP_LOST_PACKETS, "tcp_lost_packets"),
                (AGG_SUM_TCP_UNRECOVERED_TO, "tcp_unrecovered_to"),
            ]))
            .with_mins(metrics(&[
                (AGG_MIN_PROCESS_NAMES, "num_process_names"),
                (AGG_MIN_PROCESS_IDS, "num_process_ids"),
                (AGG_MIN_TCP_SEND_CONGESTION_WINDOW, "tcp_min_send_congestion_window"),
                (AGG_MIN_TCP_MSS, "tcp_min_mss"),
            ]))
            .with_maxs(metrics(&[
                (AGG_MAX_PROCESS_NAMES, "num_process_names"),
                (AGG_MAX_PROCESS_IDS, "num_process_ids"),
                (AGG_MAX_TCP_SMOOTH_RTT, "tcp_max_smooth_rtt"),
                (AGG_MAX_TCP_MIN_RTT, "tcp_max_min_rtt"),
            ]))
            .with_means(vec![
                MeanInfo::new(
                    AGG_MEAN_TCP_SEND_CONGESTION_WINDOW,
                    "tcp_mean_send_congestion_window",
                ),
                MeanInfo::new(AGG_MEAN_TCP_SMOOTH_RTT, "tcp_mean_smooth_rtt"),
                MeanInfo::new(AGG_MEAN_TCP_MIN_RTT, "tcp_mean_min_rtt"),
                MeanInfo::new(AGG_MEAN_TCP_MSS, "tcp_mean_mss"),
            ])
            .with_nested_terms(vec![label_terms("dest_labels"), label_terms("source_labels")])
    }

    fn convert_bucket(&self, bucket: &CompositeAggregationBucket) -> L3Flow {
        let ft = &self.tracker;
        let key = &bucket.key;
        debug!(doc_count = bucket.doc_count, "processing flow bucket");

        let protocol = ft.value_string(key, "proto");
        let mut flow = L3Flow {
            key: L3FlowKey {
                cluster: ft.value_string(key, "cluster"),
                reporter: ft.value_string(key, "reporter"),
                action: ft.value_string(key, "action"),
                protocol: protocol.clone(),
                source: Endpoint {
                    kind: ft.value_string(key, "source_type"),
                    aggregated_name: ft.value_string(key, "source_name_aggr"),
                    namespace: ft.value_string(key, "source_namespace"),
                    port: 0,
                },
                destination: Endpoint {
                    kind: ft.value_string(key, "dest_type"),
                    aggregated_name: ft.value_string(key, "dest_name_aggr"),
                    namespace: ft.value_string(key, "dest_namespace"),
                    port: ft.value_i64(key, "dest_port_num"),
                },
            },
            log_stats: Some(LogStats {
                log_count: bucket.doc_count,
                flow_log_count: bucket.sum(AGG_SUM_NUM_FLOWS) as i64,
                started: bucket.sum(AGG_SUM_NUM_FLOWS_STARTED) as i64,
                completed: bucket.sum(AGG_SUM_NUM_FLOWS_COMPLETED) as i64,
            }),
            service: Some(Service {
                name: ft.value_string(key, "dest_service_name"),
                namespace: ft.value_string(key, "dest_service_namespace"),
                port_name: ft.value_string(key, "dest_service_port_name"),
                port: i64::from(ft.value_i32(key, "dest_service_port_num")),
            }),
            traffic_stats: Some(TrafficStats {
                packets_in: bucket.sum(AGG_SUM_PACKETS_IN) as i64,
                packets_out: bucket.sum(AGG_SUM_PACKETS_OUT) as i64,
                bytes_in: bucket.sum(AGG_SUM_BYTES_IN) as i64,
                bytes_out: bucket.sum(AGG_SUM_BYTES_OUT) as i64,
            }),
            ..Default::default()
        };

        if protocol == "tcp" {
            flow.tcp_stats = Some(TcpStats {
                total_retransmissions: bucket.sum(AGG_SUM_TCP_RETRANSMISSIONS) as i64,
                lost_packets: bucket.sum(AGG_SUM_TCP_LOST_PACKETS) as i64,
                unrecovered_to: bucket.sum(AGG_SUM_TCP_UNRECOVERED_TO) as i64,
                min_send_congestion_window: bucket.min(AGG_MIN_TCP_SEND_CONGESTION_WINDOW),
                min_mss: bucket.min(AGG_MIN_TCP_MSS),
                max_smooth_rtt: bucket.max(AGG_MAX_TCP_SMOOTH_RTT),
                max_min_rtt: bucket.max(AGG_MAX_TCP_MIN_RTT),
                mean_send_congestion_window: bucket.mean(AGG_MEAN_TCP_SEND_CONGESTION_WINDOW),
                mean_smooth_rtt: bucket.mean(AGG_MEAN_TCP_SMOOTH_RTT),
                mean_min_rtt: bucket.mean(AGG_MEAN_TCP_MIN_RTT),
                mean_mss: bucket.mean(AGG_MEAN_TCP_MSS),
            });
        }

        let process_name = ft.value_string(key, "process_name");
        if !process_name.is_empty() {
            flow.process = Some(Process { name: process_name });
            flow.process_stats = Some(ProcessStats {
                min_num_names_per_flow: bucket.min(AGG_MIN_PROCESS_NAMES),
                max_num_names_per_flow: bucket.max(AGG_MAX_PROCESS_NAMES),
                min_num_ids_per_flow: bucket.min(AGG_MIN_PROCESS_IDS),
                max_num_ids_per_flow: bucket.max(AGG_MAX_PROCESS_IDS),
            });
        }

        flow.destination_labels = labels(bucket, "dest_labels");
        flow.source_labels = labels(bucket, "source_labels");
        flow
    }
}

impl std::fmt::Debug for FlowBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowBackend")
            .field("layout", &self.helper.router().layout())
            .finish()
    }
}

/// Term clauses for the endpoint filters of `params`
fn endpoint_filters(params: &L3FlowParams) -> Vec<Query> {
    let mut clauses = Vec::new();
    let sides = [("source", &params.source), ("dest", &params.destination)];
    for (side, filter) in sides {
        let Some(EndpointFilter {
            kind,
            namespace,
            aggregated_name,
        }) = filter
        else {
            continue;
        };
        for (suffix, value) in [
            ("type", kind),
            ("namespace", namespace),
            ("name_aggr", aggregated_name),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                clauses.push(Query::term(format!("{side}_{suffix}"), value));
            }
        }
    }
    clauses
}

/// Group `key=value` label terms by key, both sorted
fn labels(bucket: &CompositeAggregationBucket, name: &str) -> Vec<FlowLabels> {
    let Some(terms) = bucket.terms.get(name) else {
        return Vec::new();
    };
    let mut by_key: BTreeMap<&str, Vec<FlowLabelValue>> = BTreeMap::new();
    for (label, count) in &terms.buckets {
        let parts: Vec<&str> = label.split('=').collect();
        let [key, value] = parts.as_slice() else {
            warn!(value = %label, "skipping label not in key=value format");
            continue;
        };
        by_key.entry(*key).or_default().push(FlowLabelValue {
            value: value.to_string(),
            count: *count,
        });
    }
    by_key
        .into_iter()
        .map(|(key, mut values)| {
            values.sort_by(|a, b| a.value.cmp(&b.value));
            FlowLabels {
                key: key.to_string(),
                values,
            }
        })
        .collect()
}
