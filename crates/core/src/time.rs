//! Time ranges for reads

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Window applied when a request carries no time range
pub const DEFAULT_LOOKBACK_MINUTES: i64 = 5;

/// Half-open time window `(from, to]`.
///
/// A missing `to` leaves the range open above. `field` overrides the log
/// type's default time field, e.g. to filter events on `generated_time`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Exclusive lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    /// Field to filter on instead of the log type's time field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl TimeRange {
    /// Range between two instants
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        TimeRange {
            from: Some(from),
            to: Some(to),
            field: None,
        }
    }

    /// Range with only a lower bound
    pub fn since(from: DateTime<Utc>) -> Self {
        TimeRange {
            from: Some(from),
            to: None,
            field: None,
        }
    }

    /// The last [`DEFAULT_LOOKBACK_MINUTES`] minutes up to now
    pub fn last_default_window() -> Self {
        let now = Utc::now();
        TimeRange::between(now - Duration::minutes(DEFAULT_LOOKBACK_MINUTES), now)
    }

    /// Builder: filter on another field
    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// True when `t` falls inside `(from, to]`
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        if let Some(from) = self.from {
            if t <= from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if t > to {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_half_open() {
        let from = Utc::now() - Duration::minutes(10);
        let to = Utc::now();
        let tr = TimeRange::between(from, to);
        assert!(!tr.contains(from));
        assert!(tr.contains(to));
        assert!(tr.contains(from + Duration::seconds(1)));
        assert!(!tr.contains(to + Duration::seconds(1)));
    }

    #[test]
    fn test_open_ended_range() {
        let from = Utc::now() - Duration::minutes(10);
        let tr = TimeRange::since(from);
        assert!(tr.contains(Utc::now() + Duration::days(1)));
    }

    #[test]
    fn test_default_window() {
        let tr = TimeRange::last_default_window();
        let span = tr.to.unwrap() - tr.from.unwrap();
        assert_eq!(span, Duration::minutes(DEFAULT_LOOKBACK_MINUTES));
    }
}
