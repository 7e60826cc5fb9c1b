//! Security events raised by detectors

use super::impl_log_params;
use crate::params::{LogSelectionParams, QueryParams, SortBy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One security event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// When the event happened, epoch seconds
    pub time: i64,
    pub description: String,
    pub origin: String,
    pub severity: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub alert: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    pub source_name: String,
    pub source_namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_ip: Option<String>,
    pub dest_name: String,
    pub dest_namespace: String,
    pub host: String,
    pub attack_vector: String,
    pub mitre_ids: Vec<String>,
    pub dismissed: bool,
    /// Detector-specific payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
    pub cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_time: Option<DateTime<Utc>>,
}

/// Params for listing events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventParams {
    #[serde(flatten)]
    pub query_params: QueryParams,
    #[serde(flatten)]
    pub selection: LogSelectionParams,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortBy>,
    /// Return only the event with this ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl_log_params!(EventParams);
