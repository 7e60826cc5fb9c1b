//! Query composition
//!
//! Every read is one `bool` query:
//! - `filter`: tenancy filter, time range, RBAC clause
//! - `must`: selector clause plus log-type specific clauses
//!
//! The tenancy filter is always present. Dropping it in single-index layout
//! would leak other tenants' documents.

use crate::dsl::{BoolQuery, Query, RangeQuery, SortField};
use crate::fields::{FieldSet, ValueKind, CLUSTER_FIELD, GENERATED_TIME_FIELD, TENANT_FIELD};
use crate::index::IndexRouter;
use crate::rbac::RbacStrategy;
use crate::selector::selector_query;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use siftlog_core::{ClusterInfo, Error, LogParams, Permission, Result, TimeRange};

/// Encoding of a log type's time field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// Integer seconds since the epoch
    EpochSeconds,
    /// RFC 3339 string
    Rfc3339,
}

impl TimeFormat {
    pub fn encode(&self, t: DateTime<Utc>) -> Value {
        match self {
            TimeFormat::EpochSeconds => Value::from(t.timestamp()),
            TimeFormat::Rfc3339 => Value::from(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// Builds queries for one log type
#[derive(Debug, Clone)]
pub struct QueryHelper {
    router: IndexRouter,
    time_field: &'static str,
    time_format: TimeFormat,
    fields: &'static FieldSet,
    rbac: RbacStrategy,
}

impl QueryHelper {
    pub fn new(
        router: IndexRouter,
        time_field: &'static str,
        time_format: TimeFormat,
        fields: &'static FieldSet,
        rbac: RbacStrategy,
    ) -> Self {
        QueryHelper {
            router,
            time_field,
            time_format,
            fields,
            rbac,
        }
    }

    pub fn router(&self) -> &IndexRouter {
        &self.router
    }

    pub fn fields(&self) -> &'static FieldSet {
        self.fields
    }

    pub fn time_field(&self) -> &'static str {
        self.time_field
    }

    /// Tenancy filter clauses for `ci`.
    ///
    /// For the multi-cluster sentinel the cluster clause matches `clusters`,
    /// or is left out when every cluster is requested.
    pub fn tenancy_filter(&self, ci: &ClusterInfo, clusters: &[String]) -> Vec<Query> {
        let mut filters = Vec::with_capacity(2);
        if ci.is_query_multiple_clusters() {
            if !clusters.is_empty() {
                filters.push(Query::terms(CLUSTER_FIELD, clusters.iter().cloned()));
            }
        } else {
            filters.push(Query::term(CLUSTER_FIELD, ci.cluster.as_str()));
        }
        if ci.tenant.is_empty() {
            filters.push(Query::none_of(vec![Query::exists(TENANT_FIELD)]));
        } else {
            filters.push(Query::term(TENANT_FIELD, ci.tenant.as_str()));
        }
        filters
    }

    /// `(from, to]` on the time field, or the default window when absent
    pub fn time_range_query(&self, range: Option<&TimeRange>) -> Query {
        let default_range;
        let range = match range {
            Some(r) if r.from.is_some() || r.to.is_some() => r,
            Some(r) => {
                default_range = TimeRange {
                    field: r.field.clone(),
                    ..TimeRange::last_default_window()
                };
                &default_range
            }
            None => {
                default_range = TimeRange::last_default_window();
                &default_range
            }
        };

        let (field, format) = match range.field.as_deref() {
            Some(field) => (field, self.format_of(field)),
            None => (self.time_field, self.time_format),
        };
        let mut q = RangeQuery::new(field);
        if let Some(from) = range.from {
            q = q.gt(format.encode(from));
        }
        if let Some(to) = range.to {
            q = q.lte(format.encode(to));
        }
        Query::Range(q)
    }

    fn format_of(&self, field: &str) -> TimeFormat {
        if field == self.time_field {
            return self.time_format;
        }
        if field == GENERATED_TIME_FIELD {
            return TimeFormat::Rfc3339;
        }
        match self.fields.get(field).map(|s| s.kind) {
            Some(ValueKind::EpochSeconds) => TimeFormat::EpochSeconds,
            _ => TimeFormat::Rfc3339,
        }
    }

    /// RBAC clause for the caller's grants
    pub fn rbac_query(&self, permissions: Option<&[Permission]>) -> Result<Option<Query>> {
        self.rbac.query(permissions)
    }

    /// Selector clause
    pub fn selector_query(&self, selector: &str) -> Result<Option<Query>> {
        selector_query(selector, self.fields)
    }

    /// Full query for a read by `ci` with `params`.
    ///
    /// `extra` clauses are ANDed with the selector.
    pub fn build_query<P: LogParams + ?Sized>(
        &self,
        ci: &ClusterInfo,
        params: &P,
        extra: Vec<Query>,
    ) -> Result<Query> {
        let mut query = BoolQuery::new();
        for clause in self.tenancy_filter(ci, params.clusters()) {
            query = query.filter(clause);
        }
        query = query.filter(self.time_range_query(params.time_range()));
        if let Some(rbac) = self.rbac_query(params.permissions())? {
            query = query.filter(rbac);
        }
        if let Some(selector) = self.selector_query(params.selector())? {
            query = query.must(selector);
        }
        for clause in extra {
            query = query.must(clause);
        }
        Ok(Query::Bool(query))
    }

    /// Sort for a hit list; the time field ascending when none is requested
    pub fn sort<P: LogParams + ?Sized>(&self, params: &P) -> Result<Vec<SortField>> {
        if params.sort_by().is_empty() {
            return Ok(vec![SortField::asc(self.time_field)]);
        }
        params
            .sort_by()
            .iter()
            .map(|s| {
                let known = s.field == self.time_field
                    || s.field == GENERATED_TIME_FIELD
                    || self.fields.get(&s.field).map(|f| f.nested.is_none()).unwrap_or(false);
                if !known {
                    return Err(Error::invalid_request(format!(
                        "unsupported sort field: {}",
                        s.field
                    )));
                }
                Ok(SortField {
                    field: s.field.clone(),
                    descending: s.descending,
                })
            })
            .collect()
    }
}
