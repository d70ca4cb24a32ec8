//! Notion database query request body.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Value, json};

/// Formula checkbox marking a page as searchable.
pub const INCLUSION_PROPERTY: &str = "For Search";

/// Maximum page size accepted by the API.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Body of `POST /databases/{id}/query`.
///
/// Based on the Notion API reference:
/// https://developers.notion.com/reference/post-database-query
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    /// Compound filter object.
    pub filter: Value,

    /// Results per page (1-100).
    pub page_size: u32,

    /// Cursor from the previous response's `next_cursor`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
}

impl QueryRequest {
    /// Searchable pages edited on or after `cutoff`.
    pub fn changed_since(cutoff: NaiveDate, page_size: u32) -> Self {
        let filter = json!({
            "and": [
                {
                    "property": INCLUSION_PROPERTY,
                    "formula": { "checkbox": { "equals": true } }
                },
                {
                    "timestamp": "last_edited_time",
                    "last_edited_time": { "on_or_after": cutoff.format("%Y-%m-%d").to_string() }
                }
            ]
        });

        Self { filter, page_size: page_size.clamp(1, MAX_PAGE_SIZE), start_cursor: None }
    }

    /// Every searchable page, regardless of edit time.
    pub fn all_searchable(page_size: u32) -> Self {
        let filter = json!({
            "property": INCLUSION_PROPERTY,
            "formula": { "checkbox": { "equals": true } }
        });

        Self { filter, page_size: page_size.clamp(1, MAX_PAGE_SIZE), start_cursor: None }
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.start_cursor = cursor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed_since_body() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let body = serde_json::to_value(QueryRequest::changed_since(date, 100)).unwrap();

        assert_eq!(body["page_size"], 100);
        assert!(body.get("start_cursor").is_none());
        assert_eq!(body["filter"]["and"][0]["property"], "For Search");
        assert_eq!(body["filter"]["and"][0]["formula"]["checkbox"]["equals"], true);
        assert_eq!(body["filter"]["and"][1]["last_edited_time"]["on_or_after"], "2024-03-09");
    }

    #[test]
    fn test_cursor_is_serialized() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let req = QueryRequest::changed_since(date, 100).with_cursor(Some("abc".into()));
        let body = serde_json::to_value(req).unwrap();
        assert_eq!(body["start_cursor"], "abc");
    }

    #[test]
    fn test_all_searchable_has_no_time_clause() {
        let body = serde_json::to_value(QueryRequest::all_searchable(100)).unwrap();
        assert_eq!(body["filter"]["property"], "For Search");
        assert_eq!(body["filter"]["formula"]["checkbox"]["equals"], true);
        assert!(!body.to_string().contains("last_edited_time"));
    }

    #[test]
    fn test_page_size_is_clamped() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(QueryRequest::changed_since(date, 500).page_size, MAX_PAGE_SIZE);
        assert_eq!(QueryRequest::changed_since(date, 0).page_size, 1);
    }
}
