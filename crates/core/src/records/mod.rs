//! Typed records and request params per log type
//!
//! - `flows`: raw flow logs and aggregated L3 flows
//! - `dns`: DNS query logs
//! - `audit`: Kubernetes and enterprise audit logs
//! - `waf`: web application firewall logs
//! - `events`: security events (alerts)

pub mod audit;
pub mod dns;
pub mod events;
pub mod flows;
pub mod waf;

/// Implement [`LogParams`](crate::params::LogParams) for a params struct with
/// `query_params`, `selection` and `sort` fields.
macro_rules! impl_log_params {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::params::LogParams for $ty {
                fn query_params(&self) -> &$crate::params::QueryParams {
                    &self.query_params
                }

                fn selection(&self) -> Option<&$crate::params::LogSelectionParams> {
                    Some(&self.selection)
                }

                fn sort_by(&self) -> &[$crate::params::SortBy] {
                    &self.sort
                }
            }
        )+
    };
}

pub(crate) use impl_log_params;
