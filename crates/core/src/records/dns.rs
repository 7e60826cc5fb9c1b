//! DNS query logs

use super::impl_log_params;
use crate::params::{LogSelectionParams, QueryParams, SortBy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream server that answered a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsServer {
    pub name: String,
    pub name_aggr: String,
    pub namespace: String,
    pub ip: String,
}

/// Aggregated DNS queries from one client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsLog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub count: i64,
    pub client_name: String,
    pub client_name_aggr: String,
    pub client_namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    pub servers: Vec<DnsServer>,
    pub qname: String,
    pub qclass: String,
    pub qtype: String,
    pub rcode: String,
    pub latency_count: i64,
    pub latency_mean: i64,
    pub latency_max: i64,
    pub host: String,
    pub cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_time: Option<DateTime<Utc>>,
}

/// Params for listing DNS logs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsLogParams {
    #[serde(flatten)]
    pub query_params: QueryParams,
    #[serde(flatten)]
    pub selection: LogSelectionParams,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortBy>,
}

impl_log_params!(DnsLogParams);
