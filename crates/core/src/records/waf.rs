//! Web application firewall logs

use super::impl_log_params;
use crate::params::{LogSelectionParams, QueryParams, SortBy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WafEndpoint {
    pub hostname: String,
    pub ip: String,
    pub port_num: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WafRuleInfo {
    pub id: String,
    pub message: String,
    pub severity: String,
    pub file: String,
    pub line: String,
}

/// One request inspected by the firewall
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WafLog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "@timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    pub unique_id: String,
    pub request_id: String,
    pub source: WafEndpoint,
    pub destination: WafEndpoint,
    pub path: String,
    pub method: String,
    pub protocol: String,
    pub msg: String,
    pub rules: Vec<WafRuleInfo>,
    pub host: String,
    pub level: String,
    pub cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_time: Option<DateTime<Utc>>,
}

/// Params for listing WAF logs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WafLogParams {
    #[serde(flatten)]
    pub query_params: QueryParams,
    #[serde(flatten)]
    pub selection: LogSelectionParams,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortBy>,
}

impl_log_params!(WafLogParams);
