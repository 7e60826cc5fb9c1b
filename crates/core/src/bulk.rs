//! Result of a batch write

use serde::{Deserialize, Serialize};

/// Per-document failure inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkError {
    /// Document the failure refers to (its ID when known)
    pub resource: String,
    /// Engine error type, e.g. `mapper_parsing_exception`
    #[serde(rename = "type")]
    pub kind: String,
    /// Human readable reason
    pub reason: String,
}

/// Per-document outcome of an update or delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItem {
    /// Bare document ID
    pub id: String,
    /// HTTP-like status of the item
    pub status: u16,
}

/// Outcome of a batch write.
///
/// `succeeded + failed == total` always holds and `errors.len() == failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Documents submitted
    pub total: usize,
    /// Documents accepted
    pub succeeded: usize,
    /// Documents rejected
    pub failed: usize,
    /// One entry per rejected document
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BulkError>,
    /// Items updated by an update call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated: Vec<BulkItem>,
    /// Items deleted by a delete call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<BulkItem>,
}

impl BulkResponse {
    /// Record a rejected document
    pub fn push_error(
        &mut self,
        resource: impl Into<String>,
        kind: impl Into<String>,
        reason: impl Into<String>,
    ) {
        self.total += 1;
        self.failed += 1;
        self.errors.push(BulkError {
            resource: resource.into(),
            kind: kind.into(),
            reason: reason.into(),
        });
    }

    /// Record an accepted document
    pub fn push_success(&mut self) {
        self.total += 1;
        self.succeeded += 1;
    }

    /// True when every document was accepted
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}
