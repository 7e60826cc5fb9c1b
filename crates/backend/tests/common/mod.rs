//! Shared fixtures for backend integration tests
#![allow(dead_code)]

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use siftlog_backend::{LogStore, StorageConfig};
use siftlog_core::records::flows::{FlowLog, FlowLogLabels};
use siftlog_core::{ClusterInfo, QueryParams, TimeRange};
use siftlog_engine::{DocumentEngine, MemoryEngine};
use siftlog_query::IndexLayout;
use std::sync::Arc;

/// In-memory engine plus every backend on top of it
pub struct Harness {
    pub engine: Arc<MemoryEngine>,
    pub store: LogStore,
}

impl Harness {
    pub fn new(layout: IndexLayout) -> Self {
        Self::with(MemoryEngine::new(), storage(layout))
    }

    pub fn with(engine: MemoryEngine, storage: StorageConfig) -> Self {
        init_tracing();
        let engine = Arc::new(engine);
        let shared: Arc<dyn DocumentEngine> = engine.clone();
        Harness {
            store: LogStore::with_engine(shared, &storage),
            engine,
        }
    }
}

/// Route backend logs to the test output; only the first call installs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn storage(layout: IndexLayout) -> StorageConfig {
    StorageConfig::default().with_single_index(layout == IndexLayout::SingleIndex)
}

/// Lowercase name unlikely to collide between tests
pub fn random_name(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("{prefix}-{}", suffix.to_lowercase())
}

pub fn random_cluster() -> ClusterInfo {
    ClusterInfo::new(random_name("cluster")).with_tenant(random_name("tenant"))
}

/// Query params covering the last hour and the next one
pub fn recent() -> QueryParams {
    let now = Utc::now();
    QueryParams::default().with_time_range(TimeRange::between(
        now - Duration::hours(1),
        now + Duration::hours(1),
    ))
}

pub fn flow_log(id: &str) -> FlowLog {
    FlowLog {
        id: Some(id.to_string()),
        start_time: Utc::now().timestamp() - 30,
        end_time: Utc::now().timestamp(),
        source_ip: Some("10.0.0.1".into()),
        source_name: "client-abc".into(),
        source_name_aggr: "client-*".into(),
        source_namespace: "default".into(),
        source_port: Some(40000),
        source_type: "wep".into(),
        source_labels: Some(FlowLogLabels {
            labels: vec!["app=client".into()],
        }),
        dest_ip: Some("10.0.0.2".into()),
        dest_name: "nginx-xyz".into(),
        dest_name_aggr: "nginx-*".into(),
        dest_namespace: "default".into(),
        dest_port: Some(443),
        dest_type: "wep".into(),
        dest_labels: Some(FlowLogLabels {
            labels: vec!["app=web".into()],
        }),
        dest_service_namespace: "default".into(),
        dest_service_name: "nginx".into(),
        dest_service_port: "https".into(),
        dest_service_port_num: Some(443),
        proto: "tcp".into(),
        action: "allow".into(),
        reporter: "dst".into(),
        bytes_in: 100,
        bytes_out: 50,
        num_flows: 1,
        num_flows_started: 1,
        num_flows_completed: 0,
        packets_in: 10,
        packets_out: 5,
        process_name: "nginx".into(),
        num_process_names: 1,
        process_id: "42".into(),
        num_process_ids: 1,
        tcp_mean_mss: 1400,
        tcp_min_mss: 1400,
        tcp_mean_smooth_rtt: 20,
        tcp_max_smooth_rtt: 30,
        host: "node-1".into(),
        ..Default::default()
    }
}

/// `n` flow logs with IDs `f000`, `f001`, ...
pub fn flow_logs(n: usize) -> Vec<FlowLog> {
    (0..n).map(|i| flow_log(&format!("f{i:03}"))).collect()
}
