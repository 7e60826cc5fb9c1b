//! Tenancy context carried by every backend call

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Cluster name that asks a read to span several clusters.
///
/// The concrete cluster set comes from
/// [`LogParams::clusters`](crate::params::LogParams::clusters); an empty set
/// means every cluster of the tenant.
pub const QUERY_MULTIPLE_CLUSTERS: &str = "__query_multiple_clusters__";

/// Identifies the cluster (and optionally the tenant) a request is scoped to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Managed cluster the data belongs to
    pub cluster: String,
    /// Tenant owning the cluster; empty in single-tenant deployments
    #[serde(default)]
    pub tenant: String,
}

impl ClusterInfo {
    /// Scope for a single cluster without a tenant
    pub fn new(cluster: impl Into<String>) -> Self {
        ClusterInfo {
            cluster: cluster.into(),
            tenant: String::new(),
        }
    }

    /// Builder: set the tenant
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Check the context is safe to embed in index names and filters.
    ///
    /// The cluster must be non-empty. Neither field may contain `*` or `,`
    /// or start with `-`.
    pub fn valid(&self) -> Result<()> {
        if self.cluster.is_empty() {
            return Err(Error::invalid_tenancy("no cluster ID on request"));
        }
        validate_name("cluster", &self.cluster)?;
        if !self.tenant.is_empty() {
            validate_name("tenant", &self.tenant)?;
        }
        Ok(())
    }

    /// True when the cluster is the multi-cluster sentinel
    pub fn is_query_multiple_clusters(&self) -> bool {
        self.cluster == QUERY_MULTIPLE_CLUSTERS
    }

    /// Tracing span carrying the tenancy fields
    pub fn span(&self, log_type: &'static str) -> tracing::Span {
        tracing::info_span!(
            "siftlog",
            log_type,
            cluster = %self.cluster,
            tenant = %self.tenant,
        )
    }
}

/// Validate a single cluster or tenant name.
///
/// Used for [`ClusterInfo`] fields and for the clusters selected by a
/// multi-cluster read.
pub fn validate_name(field: &str, value: &str) -> Result<()> {
    if value.contains('*') {
        return Err(Error::invalid_tenancy(format!(
            "{field} cannot contain '*': {value}"
        )));
    }
    if value.contains(',') {
        return Err(Error::invalid_tenancy(format!(
            "{field} cannot contain ',': {value}"
        )));
    }
    if value.starts_with('-') {
        return Err(Error::invalid_tenancy(format!(
            "{field} cannot start with '-': {value}"
        )));
    }
    Ok(())
}
