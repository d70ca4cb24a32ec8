//! Typed view over cached Notion pages.
//!
//! The cache treats a page as an opaque document except for its `id` and the
//! handful of properties the search and tag code reads. Everything else is
//! carried through untouched so snapshots round-trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Title property of every collection.
pub const TITLE_PROPERTY: &str = "Name";

/// Formula property holding the searchable text.
pub const SEARCH_TERM_PROPERTY: &str = "Search Term";

pub const SEARCH_PREFIX_PROPERTY: &str = "Search Prefix";
pub const SEARCH_SUFFIX_PROPERTY: &str = "Search Suffix";

/// A cached record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,

    #[serde(default)]
    pub properties: Map<String, Value>,

    /// Remaining top-level fields (timestamps, url, parent, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of a prioritized property lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The requested property had a value.
    Found(String),
    /// The requested property was empty; a fallback property supplied the value.
    FellBackTo { property: String, value: String },
    /// Neither the property nor any fallback had a value.
    Missing,
}

impl Resolution {
    pub fn value(&self) -> Option<&str> {
        match self {
            Resolution::Found(v) | Resolution::FellBackTo { value: v, .. } => Some(v),
            Resolution::Missing => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::FellBackTo { .. })
    }
}

impl Page {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), properties: Map::new(), extra: Map::new() }
    }

    /// Builder used by tests and fixtures: set a title property.
    pub fn with_title(mut self, title: &str) -> Self {
        self.properties.insert(
            TITLE_PROPERTY.to_string(),
            serde_json::json!({
                "type": "title",
                "title": [{ "type": "text", "text": { "content": title }, "plain_text": title }]
            }),
        );
        self
    }

    /// Builder used by tests and fixtures: set a string formula property.
    pub fn with_formula(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(
            name.to_string(),
            serde_json::json!({ "type": "formula", "formula": { "type": "string", "string": value } }),
        );
        self
    }

    /// First text run of the title property, empty if absent.
    pub fn title(&self) -> &str {
        self.properties
            .get(TITLE_PROPERTY)
            .and_then(|p| p.get("title"))
            .and_then(Value::as_array)
            .and_then(|runs| runs.first())
            .and_then(|run| run.pointer("/text/content").or_else(|| run.get("plain_text")))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// String result of a formula property.
    ///
    /// Returns `None` unless the property exists, is a formula, and its
    /// string result is non-blank.
    pub fn formula_string(&self, name: &str) -> Option<&str> {
        let prop = self.properties.get(name)?;
        if prop.get("type").and_then(Value::as_str) != Some("formula") {
            return None;
        }
        prop.pointer("/formula/string")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn search_term(&self) -> Option<&str> {
        self.formula_string(SEARCH_TERM_PROPERTY)
    }

    pub fn search_prefix(&self) -> &str {
        self.formula_string(SEARCH_PREFIX_PROPERTY).unwrap_or("")
    }

    pub fn search_suffix(&self) -> &str {
        self.formula_string(SEARCH_SUFFIX_PROPERTY).unwrap_or("")
    }

    /// Picker label for the page within the named collection.
    pub fn display_text(&self, collection: &str) -> String {
        let title = match collection {
            "Textbooks" => self.search_term().unwrap_or("Untitled"),
            _ if self.title().is_empty() => "Untitled",
            _ => self.title(),
        };

        let parts: Vec<&str> = match collection {
            "Subjects" | "Pharmacology" => vec![self.search_prefix(), title, self.search_suffix()],
            _ => vec![title, self.search_suffix()],
        };

        parts.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ")
    }

    /// Resolve `primary`, falling back through `fallbacks` in order.
    pub fn resolve_property(&self, primary: &str, fallbacks: &[&str]) -> Resolution {
        if let Some(value) = self.formula_string(primary) {
            return Resolution::Found(value.to_string());
        }

        fallbacks
            .iter()
            .filter(|name| **name != primary)
            .find_map(|name| {
                self.formula_string(name)
                    .map(|value| Resolution::FellBackTo { property: name.to_string(), value: value.to_string() })
            })
            .unwrap_or(Resolution::Missing)
    }
}
