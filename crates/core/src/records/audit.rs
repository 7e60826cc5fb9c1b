//! Audit logs
//!
//! Two subtypes share one record shape: `kube` (API server audit events)
//! and `ee` (audit events for enterprise resources). Each subtype lives in
//! its own index family.

use super::impl_log_params;
use crate::error::{Error, Result};
use crate::params::{LogSelectionParams, QueryParams, SortBy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Audit log subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLogType {
    /// Kubernetes API server audit events
    Kube,
    /// Enterprise resource audit events
    Ee,
}

impl AuditLogType {
    /// Wire name of the subtype
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLogType::Kube => "kube",
            AuditLogType::Ee => "ee",
        }
    }
}

impl fmt::Display for AuditLogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditLogType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kube" => Ok(AuditLogType::Kube),
            "ee" => Ok(AuditLogType::Ee),
            other => Err(Error::invalid_request(format!(
                "unsupported audit log type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditUser {
    pub username: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuditObjectRef {
    pub resource: String,
    pub namespace: String,
    pub name: String,
    pub api_group: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditResponseStatus {
    pub code: i64,
}

/// One audit event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuditLog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "auditID")]
    pub audit_id: String,
    pub level: String,
    pub stage: String,
    pub verb: String,
    #[serde(rename = "requestURI")]
    pub request_uri: String,
    pub user: AuditUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_ref: Option<AuditObjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<AuditResponseStatus>,
    pub request_received_timestamp: Option<DateTime<Utc>>,
    pub stage_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "cluster")]
    pub cluster: String,
    #[serde(rename = "generated_time", skip_serializing_if = "Option::is_none")]
    pub generated_time: Option<DateTime<Utc>>,
}

/// Params for listing audit logs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditLogParams {
    #[serde(flatten)]
    pub query_params: QueryParams,
    #[serde(flatten)]
    pub selection: LogSelectionParams,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortBy>,
    /// Subtype to read; required
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub audit_type: Option<AuditLogType>,
}

impl_log_params!(AuditLogParams);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_type_parse() {
        assert_eq!("kube".parse::<AuditLogType>().unwrap(), AuditLogType::Kube);
        assert_eq!("ee".parse::<AuditLogType>().unwrap(), AuditLogType::Ee);
        let err = "bogus".parse::<AuditLogType>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_audit_wire_names() {
        let log = AuditLog {
            audit_id: "a1".into(),
            request_uri: "/api/v1/pods".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["auditID"], "a1");
        assert_eq!(json["requestURI"], "/api/v1/pods");
        assert!(json.get("id").is_none());
    }
}
