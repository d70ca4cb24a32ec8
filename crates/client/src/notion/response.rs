//! Notion database query response types.

use serde::Deserialize;
use tagcache_core::Page;

/// One page of query results.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<Page>,

    #[serde(default)]
    pub has_more: bool,

    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl QueryResponse {
    /// Cursor for the next request, if the server says there is one.
    pub fn continuation(&self) -> Option<&str> {
        if self.has_more { self.next_cursor.as_deref() } else { None }
    }
}
