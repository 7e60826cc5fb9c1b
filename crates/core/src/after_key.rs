//! Opaque pagination cursor

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cursor key holding the offset of the next page
pub const START_FROM: &str = "startFrom";
/// Cursor key holding the point-in-time identifier of a deep traversal
pub const PIT_ID: &str = "pitId";
/// Cursor key holding the sort values of the last hit returned
pub const SEARCH_AFTER: &str = "searchAfter";

/// Position of the next page of a list or aggregation.
///
/// Produced by the backend and round-tripped verbatim by callers. For hit
/// lists it holds [`START_FROM`] and, in deep mode, [`PIT_ID`] and
/// [`SEARCH_AFTER`]; for bucket lists it holds the engine's composite key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AfterKey(Map<String, Value>);

impl AfterKey {
    /// Wrap a raw JSON object
    pub fn from_map(map: Map<String, Value>) -> Self {
        AfterKey(map)
    }

    /// Raw JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the raw JSON object
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Builder: store `value` under `key`
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// True when the cursor carries nothing
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
