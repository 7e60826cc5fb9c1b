//! Log type descriptions
//!
//! | Log type    | Time field                 | RBAC              | Mutable |
//! |-------------|----------------------------|-------------------|---------|
//! | flow logs   | `end_time` (epoch seconds) | endpoints         | no      |
//! | DNS logs    | `end_time`                 | client namespace  | no      |
//! | audit logs  | `requestReceivedTimestamp` | none              | no      |
//! | WAF logs    | `@timestamp`               | none              | no      |
//! | events      | `time` (epoch seconds)     | none              | yes     |

pub mod audit;
pub mod dns;
pub mod events;
pub mod flows;
pub mod waf;

pub use audit::{AuditBackend, AuditSchema};
pub use dns::DnsLogSchema;
pub use events::EventSchema;
pub use flows::{FlowBackend, FlowLogSchema};
pub use waf::WafLogSchema;
