//! RBAC clauses
//!
//! Turns the caller's `list` grants into a query clause that limits results
//! to the data those grants cover. `None` grants mean RBAC is not applied;
//! an empty grant set (or one with nothing usable) is forbidden.

use crate::dsl::{BoolQuery, Query};
use siftlog_core::{Error, Permission, Result};

/// API group of the network resources
pub const NETWORK_API_GROUP: &str = "projectcalico.org";

/// Namespace recorded for global (non-namespaced) network sets
pub const GLOBAL_NAMESPACE: &str = "-";

/// How a log type maps grants onto its documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RbacStrategy {
    /// Flow-style documents with typed source and destination endpoints
    Endpoints,
    /// Documents owned by a client namespace, e.g. DNS logs
    ClientNamespace(&'static str),
    /// No per-document filtering
    Unrestricted,
}

impl RbacStrategy {
    /// Build the RBAC clause for `permissions`
    pub fn query(&self, permissions: Option<&[Permission]>) -> Result<Option<Query>> {
        let Some(permissions) = permissions else {
            return Ok(None);
        };
        if permissions.is_empty() {
            return Err(Error::Forbidden("no permissions granted".to_string()));
        }
        match self {
            RbacStrategy::Endpoints => endpoint_query(permissions).map(Some),
            RbacStrategy::ClientNamespace(field) => namespace_query(field, permissions),
            RbacStrategy::Unrestricted => Ok(None),
        }
    }
}

fn endpoint_clauses(kind: &str, namespace: Option<&str>, global: Option<bool>) -> Vec<Query> {
    ["source", "dest"]
        .iter()
        .map(|side| {
            let type_term = Query::term(format!("{side}_type"), kind);
            let ns_field = format!("{side}_namespace");
            match (namespace, global) {
                (Some(ns), _) => Query::all_of(vec![type_term, Query::term(ns_field, ns)]),
                (None, Some(true)) => {
                    Query::all_of(vec![type_term, Query::term(ns_field, GLOBAL_NAMESPACE)])
                }
                (None, Some(false)) => Query::Bool(
                    BoolQuery::new()
                        .must(type_term)
                        .must_not(Query::term(ns_field, GLOBAL_NAMESPACE)),
                ),
                (None, None) => type_term,
            }
        })
        .collect()
}

fn endpoint_query(permissions: &[Permission]) -> Result<Query> {
    let mut clauses: Vec<Query> = Vec::new();
    for perm in permissions.iter().filter(|p| p.allows_list()) {
        let ns = perm.namespace.as_deref();
        let new = match (perm.api_group.as_str(), perm.resource.as_str()) {
            ("", "pods") => endpoint_clauses("wep", ns, None),
            (NETWORK_API_GROUP, "networksets") => match ns {
                Some(_) => endpoint_clauses("ns", ns, None),
                None => endpoint_clauses("ns", None, Some(false)),
            },
            (NETWORK_API_GROUP, "globalnetworksets") => endpoint_clauses("ns", None, Some(true)),
            (NETWORK_API_GROUP, "hostendpoints") => endpoint_clauses("hep", None, None),
            _ => continue,
        };
        for clause in new {
            if !clauses.contains(&clause) {
                clauses.push(clause);
            }
        }
    }
    collapse(clauses).ok_or_else(|| Error::Forbidden("no permissions to view flows".to_string()))
}

fn namespace_query(field: &str, permissions: &[Permission]) -> Result<Option<Query>> {
    let mut clauses: Vec<Query> = Vec::new();
    for perm in permissions.iter().filter(|p| p.allows_list()) {
        if !(perm.api_group.is_empty() && perm.resource == "pods") {
            continue;
        }
        match perm.namespace.as_deref() {
            None => return Ok(None),
            Some(ns) => {
                let clause = Query::term(field, ns);
                if !clauses.contains(&clause) {
                    clauses.push(clause);
                }
            }
        }
    }
    collapse(clauses)
        .map(Some)
        .ok_or_else(|| Error::Forbidden("no permissions to view pods".to_string()))
}

fn collapse(mut clauses: Vec<Query>) -> Option<Query> {
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(Query::any_of(clauses)),
    }
}
