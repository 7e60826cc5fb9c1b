//! Flow logs and aggregated L3 flows

use super::impl_log_params;
use crate::params::{LogSelectionParams, QueryParams, SortBy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Raw flow logs
// ============================================================================

/// Label set attached to one side of a flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLogLabels {
    /// `key=value` strings
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Policies that matched a flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLogPolicies {
    /// `<tier>|<policy>|<action>` strings
    #[serde(default)]
    pub all_policies: Vec<String>,
}

/// One flow log as written by a node agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowLog {
    /// Document ID, never stored in the document body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Start of the reporting interval, epoch seconds
    pub start_time: i64,
    /// End of the reporting interval, epoch seconds
    pub end_time: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    pub source_name: String,
    pub source_name_aggr: String,
    pub source_namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port: Option<i64>,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_labels: Option<FlowLogLabels>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_ip: Option<String>,
    pub dest_name: String,
    pub dest_name_aggr: String,
    pub dest_namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_port: Option<i64>,
    pub dest_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_labels: Option<FlowLogLabels>,

    pub dest_service_namespace: String,
    pub dest_service_name: String,
    pub dest_service_port: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_service_port_num: Option<i64>,

    pub proto: String,
    pub action: String,
    pub reporter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<FlowLogPolicies>,

    pub bytes_in: i64,
    pub bytes_out: i64,
    pub num_flows: i64,
    pub num_flows_started: i64,
    pub num_flows_completed: i64,
    pub packets_in: i64,
    pub packets_out: i64,
    pub http_requests_allowed_in: i64,
    pub http_requests_denied_in: i64,

    pub process_name: String,
    pub num_process_names: i64,
    pub process_id: String,
    pub num_process_ids: i64,
    pub process_args: Vec<String>,

    pub tcp_mean_send_congestion_window: i64,
    pub tcp_min_send_congestion_window: i64,
    pub tcp_mean_smooth_rtt: i64,
    pub tcp_max_smooth_rtt: i64,
    pub tcp_mean_min_rtt: i64,
    pub tcp_max_min_rtt: i64,
    pub tcp_mean_mss: i64,
    pub tcp_min_mss: i64,
    pub tcp_total_retransmissions: i64,
    pub tcp_lost_packets: i64,
    pub tcp_unrecovered_to: i64,

    pub host: String,
    /// Stamped by the backend on write
    pub cluster: String,
    /// Stamped by the backend on write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_time: Option<DateTime<Utc>>,
}

/// Params for listing raw flow logs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowLogParams {
    #[serde(flatten)]
    pub query_params: QueryParams,
    #[serde(flatten)]
    pub selection: LogSelectionParams,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortBy>,
}

// ============================================================================
// Aggregated L3 flows
// ============================================================================

/// One side of a flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// `wep`, `hep`, `ns` or `net`
    #[serde(rename = "type")]
    pub kind: String,
    pub aggregated_name: String,
    pub namespace: String,
    pub port: i64,
}

/// Identity of an aggregated flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct L3FlowKey {
    pub cluster: String,
    pub reporter: String,
    pub action: String,
    pub protocol: String,
    pub source: Endpoint,
    pub destination: Endpoint,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    /// Flow log documents folded into this flow
    pub log_count: i64,
    /// Sum of `num_flows`
    pub flow_log_count: i64,
    pub started: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub namespace: String,
    pub port_name: String,
    pub port: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficStats {
    pub packets_in: i64,
    pub packets_out: i64,
    pub bytes_in: i64,
    pub bytes_out: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpStats {
    pub total_retransmissions: i64,
    pub lost_packets: i64,
    pub unrecovered_to: i64,
    pub min_send_congestion_window: f64,
    pub min_mss: f64,
    pub max_smooth_rtt: f64,
    pub max_min_rtt: f64,
    pub mean_send_congestion_window: f64,
    pub mean_smooth_rtt: f64,
    pub mean_min_rtt: f64,
    pub mean_mss: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessStats {
    pub min_num_names_per_flow: f64,
    pub max_num_names_per_flow: f64,
    pub min_num_ids_per_flow: f64,
    pub max_num_ids_per_flow: f64,
}

/// One label value and how many flow logs carried it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLabelValue {
    pub value: String,
    pub count: i64,
}

/// All values seen for one label key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLabels {
    pub key: String,
    pub values: Vec<FlowLabelValue>,
}

/// Flow logs aggregated by endpoints, protocol, action and reporter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct L3Flow {
    pub key: L3FlowKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_stats: Option<LogStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_stats: Option<TrafficStats>,
    /// Present only for TCP flows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_stats: Option<TcpStats>,
    /// Present only when a process name was reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<Process>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_stats: Option<ProcessStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_labels: Vec<FlowLabels>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_labels: Vec<FlowLabels>,
}

/// Restricts one side of the flows returned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointFilter {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregated_name: Option<String>,
}

/// Params for listing L3 flows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct L3FlowParams {
    #[serde(flatten)]
    pub query_params: QueryParams,
    #[serde(flatten)]
    pub selection: LogSelectionParams,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EndpointFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<EndpointFilter>,
}

impl_log_params!(FlowLogParams, L3FlowParams);
