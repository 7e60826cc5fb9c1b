//! Index routing
//!
//! Maps a log type and a [`ClusterInfo`] onto physical index names.
//!
//! - Multi-index layout: one index family per tenant and cluster. The write
//!   alias is `<base>.<tenant>.<cluster>` (no tenant segment when the tenant
//!   is empty), backing indices are `<alias>.NNNNNN`, reads use `<alias>.*`.
//! - Single-index layout: one shared index family for everyone. Writes and
//!   reads go through the shared alias and rely on the tenancy filter.
//!
//! In single-index layout document IDs are prefixed with the tenant and
//! cluster so a bare ID from one tenant never addresses another tenant's
//! document.
//!
//! Tenant and cluster segments are escaped before they are joined: `_`
//! becomes `__`, `.` becomes `_d` and `:` becomes `_c`. A segment then never
//! contains a separator, so distinct scopes never share an index family or
//! a document ID prefix.

use serde::{Deserialize, Serialize};
use siftlog_core::{validate_name, ClusterInfo, Result};

/// Suffix of the first backing index created behind a write alias
pub const BOOTSTRAP_SUFFIX: &str = "000001";

/// Physical layout of the indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexLayout {
    /// One index family per tenant and cluster
    MultiIndex,
    /// One shared index family with tenancy stamped on every document
    SingleIndex,
}

impl IndexLayout {
    /// Both layouts, for tests that must hold in either
    pub const ALL: [IndexLayout; 2] = [IndexLayout::MultiIndex, IndexLayout::SingleIndex];

    pub fn from_single_index(single_index: bool) -> Self {
        if single_index {
            IndexLayout::SingleIndex
        } else {
            IndexLayout::MultiIndex
        }
    }
}

/// Static naming of one logical dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogIndex {
    /// Prefix of the per-cluster index families
    pub multi_base: &'static str,
    /// Name of the shared alias in single-index layout
    pub single_name: &'static str,
}

pub const FLOW_LOGS: LogIndex = LogIndex {
    multi_base: "siftlog_flows",
    single_name: "siftlog_shared_flowlogs",
};

pub const DNS_LOGS: LogIndex = LogIndex {
    multi_base: "siftlog_dns",
    single_name: "siftlog_shared_dnslogs",
};

pub const AUDIT_KUBE_LOGS: LogIndex = LogIndex {
    multi_base: "siftlog_audit_kube",
    single_name: "siftlog_shared_audit_kube",
};

pub const AUDIT_EE_LOGS: LogIndex = LogIndex {
    multi_base: "siftlog_audit_ee",
    single_name: "siftlog_shared_audit_ee",
};

pub const WAF_LOGS: LogIndex = LogIndex {
    multi_base: "siftlog_waf",
    single_name: "siftlog_shared_waflogs",
};

pub const EVENTS: LogIndex = LogIndex {
    multi_base: "siftlog_events",
    single_name: "siftlog_shared_events",
};

/// Resolves index names for one dataset under one layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRouter {
    index: LogIndex,
    layout: IndexLayout,
}

impl IndexRouter {
    pub fn new(index: LogIndex, layout: IndexLayout) -> Self {
        IndexRouter { index, layout }
    }

    pub fn layout(&self) -> IndexLayout {
        self.layout
    }

    pub fn is_single_index(&self) -> bool {
        self.layout == IndexLayout::SingleIndex
    }

    fn family(&self, tenant: &str, cluster: &str) -> String {
        if tenant.is_empty() {
            format!("{}.{}", self.index.multi_base, escape_segment(cluster))
        } else {
            format!(
                "{}.{}.{}",
                self.index.multi_base,
                escape_segment(tenant),
                escape_segment(cluster)
            )
        }
    }

    /// Alias every write for `ci` goes through
    pub fn write_alias(&self, ci: &ClusterInfo) -> String {
        match self.layout {
            IndexLayout::MultiIndex => self.family(&ci.tenant, &ci.cluster),
            IndexLayout::SingleIndex => self.index.single_name.to_string(),
        }
    }

    /// First backing index behind the write alias
    pub fn bootstrap_index(&self, ci: &ClusterInfo) -> String {
        format!("{}.{}", self.write_alias(ci), BOOTSTRAP_SUFFIX)
    }

    /// Name of the index template covering the write alias
    pub fn template_name(&self, ci: &ClusterInfo) -> String {
        self.write_alias(ci)
    }

    /// Index pattern the template applies to
    pub fn template_pattern(&self, ci: &ClusterInfo) -> String {
        format!("{}.*", self.write_alias(ci))
    }

    /// Key identifying one provisioning target
    pub fn init_key(&self, ci: &ClusterInfo) -> String {
        self.write_alias(ci)
    }

    /// Index expression reads for `ci` run against.
    ///
    /// For the multi-cluster sentinel, `clusters` selects the clusters to
    /// read; an empty selection reads every cluster of the tenant.
    pub fn read_pattern(&self, ci: &ClusterInfo, clusters: &[String]) -> Result<String> {
        if self.is_single_index() {
            return Ok(self.index.single_name.to_string());
        }
        if !ci.is_query_multiple_clusters() {
            return Ok(format!("{}.*", self.family(&ci.tenant, &ci.cluster)));
        }
        if clusters.is_empty() {
            return Ok(format!("{}.*", self.family(&ci.tenant, "").trim_end_matches('.')));
        }
        let mut patterns = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            validate_name("cluster", cluster)?;
            patterns.push(format!("{}.*", self.family(&ci.tenant, cluster)));
        }
        Ok(patterns.join(","))
    }

    fn id_prefix(tenant: &str, cluster: &str) -> String {
        format!("{}:{}:", escape_segment(tenant), escape_segment(cluster))
    }

    /// Engine document ID for a caller-visible ID
    pub fn document_id(&self, ci: &ClusterInfo, id: &str) -> String {
        match self.layout {
            IndexLayout::MultiIndex => id.to_string(),
            IndexLayout::SingleIndex => {
                format!("{}{}", Self::id_prefix(&ci.tenant, &ci.cluster), id)
            }
        }
    }

    /// Caller-visible ID for an engine document ID.
    ///
    /// `tenant` and `cluster` are the values stamped on the document.
    pub fn bare_id<'a>(&self, doc_id: &'a str, tenant: &str, cluster: &str) -> &'a str {
        match self.layout {
            IndexLayout::MultiIndex => doc_id,
            IndexLayout::SingleIndex => doc_id
                .strip_prefix(Self::id_prefix(tenant, cluster).as_str())
                .unwrap_or(doc_id),
        }
    }
}

/// Escape a tenant or cluster name so it holds no `.` or `:`
fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '_' => out.push_str("__"),
            '.' => out.push_str("_d"),
            ':' => out.push_str("_c"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use siftlog_core::QUERY_MULTIPLE_CLUSTERS;

    fn multi() -> IndexRouter {
        IndexRouter::new(FLOW_LOGS, IndexLayout::MultiIndex)
    }

    fn single() -> IndexRouter {
        IndexRouter::new(FLOW_LOGS, IndexLayout::SingleIndex)
    }

    #[test]
    fn test_multi_index_names() {
        let ci = ClusterInfo::new("c1");
        assert_eq!(multi().write_alias(&ci), "siftlog_flows.c1");
        assert_eq!(multi().bootstrap_index(&ci), "siftlog_flows.c1.000001");
        assert_eq!(multi().read_pattern(&ci, &[]).unwrap(), "siftlog_flows.c1.*");

        let ci = ClusterInfo::new("c1").with_tenant("t1");
        assert_eq!(multi().write_alias(&ci), "siftlog_flows.t1.c1");
        assert_eq!(multi().read_pattern(&ci, &[]).unwrap(), "siftlog_flows.t1.c1.*");
    }

    #[test]
    fn test_single_index_names() {
        let ci = ClusterInfo::new("c1").with_tenant("t1");
        assert_eq!(single().write_alias(&ci), "siftlog_shared_flowlogs");
        assert_eq!(single().read_pattern(&ci, &[]).unwrap(), "siftlog_shared_flowlogs");
        assert!(single().is_single_index());
    }

    #[test]
    fn test_multiple_clusters_pattern() {
        let ci = ClusterInfo::new(QUERY_MULTIPLE_CLUSTERS).with_tenant("t1");
        assert_eq!(multi().read_pattern(&ci, &[]).unwrap(), "siftlog_flows.t1.*");
        let clusters = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            multi().read_pattern(&ci, &clusters).unwrap(),
            "siftlog_flows.t1.a.*,siftlog_flows.t1.b.*"
        );
        let ci = ClusterInfo::new(QUERY_MULTIPLE_CLUSTERS);
        assert_eq!(multi().read_pattern(&ci, &[]).unwrap(), "siftlog_flows.*");
    }

    #[test]
    fn test_selected_clusters_are_validated() {
        let ci = ClusterInfo::new(QUERY_MULTIPLE_CLUSTERS);
        let err = multi().read_pattern(&ci, &["*".to_string()]).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_document_ids() {
        let ci = ClusterInfo::new("c1").with_tenant("t1");
        assert_eq!(multi().document_id(&ci, "abc"), "abc");
        let doc_id = single().document_id(&ci, "abc");
        assert_eq!(doc_id, "t1:c1:abc");
        assert_eq!(single().bare_id(&doc_id, "t1", "c1"), "abc");
        assert_eq!(single().bare_id(&doc_id, "t2", "c1"), "t1:c1:abc");
    }

    #[test]
    fn test_escape_segment() {
        assert_eq!(escape_segment("plain-name"), "plain-name");
        assert_eq!(escape_segment("a.b:c_d"), "a_db_cc__d");
        assert_ne!(escape_segment("a_d"), escape_segment("a."));
    }

    #[test]
    fn test_document_ids_are_injective() {
        let left = ClusterInfo::new("b:c").with_tenant("a");
        let right = ClusterInfo::new("c").with_tenant("a:b");
        let left_id = single().document_id(&left, "x");
        let right_id = single().document_id(&right, "x");
        assert_ne!(left_id, right_id);
        assert_eq!(single().bare_id(&left_id, "a", "b:c"), "x");
        assert_eq!(single().bare_id(&right_id, "a:b", "c"), "x");
    }

    #[test]
    fn test_index_families_are_injective() {
        let tenanted = ClusterInfo::new("c1").with_tenant("t1");
        let dotted = ClusterInfo::new("t1.c1");
        assert_eq!(multi().write_alias(&tenanted), "siftlog_flows.t1.c1");
        assert_eq!(multi().write_alias(&dotted), "siftlog_flows.t1_dc1");

        let split_left = ClusterInfo::new("c").with_tenant("a.b");
        let split_right = ClusterInfo::new("b.c").with_tenant("a");
        assert_ne!(multi().write_alias(&split_left), multi().write_alias(&split_right));
    }
}
