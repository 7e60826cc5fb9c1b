//! A page of results

use crate::after_key::AfterKey;
use serde::{Deserialize, Serialize};

/// One page of typed results.
///
/// `after_key == None` means there are no further pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List<T> {
    /// Records on this page
    pub items: Vec<T>,
    /// Matching records across all pages, when the engine counted them
    #[serde(default)]
    pub total_hits: i64,
    /// Cursor of the next page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_key: Option<AfterKey>,
}

impl<T> List<T> {
    /// An empty, final page
    pub fn empty() -> Self {
        List {
            items: Vec::new(),
            total_hits: 0,
            after_key: None,
        }
    }

    /// True when another page follows
    pub fn has_more(&self) -> bool {
        self.after_key.is_some()
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        List::empty()
    }
}
