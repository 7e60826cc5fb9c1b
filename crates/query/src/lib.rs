//! Query construction for the siftlog backend
//!
//! - `dsl`: the engine-native query tree
//! - `index`: index routing per layout
//! - `fields`: searchable fields and their mappings
//! - `selector`: the selector language
//! - `rbac`: grant-to-clause translation
//! - `builder`: composition of tenancy, time, RBAC and selector clauses
//! - `aggregation`: aggregation requests

pub mod aggregation;
pub mod builder;
pub mod dsl;
pub mod fields;
pub mod index;
pub mod rbac;
pub mod selector;

pub use aggregation::{Aggregation, CompositeSource, SortOrder, SubAggregations};
pub use builder::{QueryHelper, TimeFormat};
pub use dsl::{BoolQuery, Query, RangeQuery, SortField};
pub use fields::{FieldSet, FieldSpec, ValueKind, CLUSTER_FIELD, GENERATED_TIME_FIELD, TENANT_FIELD};
pub use index::{IndexLayout, IndexRouter, LogIndex};
pub use rbac::RbacStrategy;
pub use selector::selector_query;
