//! Hierarchical tag parsing and derivation.
//!
//! Tags look like `#Root::#Subjects::Cardiology::STEMI::02_Aetiology`: a root,
//! a `#`-prefixed collection, a page path, and optionally a section sub-tag.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::page::{Page, Resolution};

pub const MAIN_TAG_PROPERTY: &str = "Main Tag";
pub const TAG_PROPERTY: &str = "Tag";

static SUBTAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(\d+_|\*|Epidemiology|Aetiology|Risk Factors|Physiology|Pathophysiology|Clinical Features|",
        r"Management|Complications|Screening|Prevention|Diagnosis|Investigations|Generic Names|",
        r"Mechanism of Action|Indications|Contraindications|Route|Frequency|Adverse Effects|Toxicity|",
        r"Reversal|Advantages|Disadvantages|Monitoring)",
    ))
    .unwrap()
});

static NUMBER_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+_").unwrap());

/// Components of a parsed tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTag {
    pub database: String,
    pub path_parts: Vec<String>,
    pub page_name: Option<String>,
    pub subtag: Option<String>,
    pub full_tag: String,
}

/// Split a tag under `root` into its parts. `None` for foreign tags.
pub fn parse_tag(tag: &str, root: &str) -> Option<ParsedTag> {
    let content = tag.strip_prefix(root)?.strip_prefix("::")?;
    let parts: Vec<String> = content.split("::").map(str::to_string).collect();

    let database = parts.first()?.replace('#', "");
    let mut page_name = if parts.len() > 1 { parts.last().cloned() } else { None };
    let mut subtag = None;

    let ends_in_section = parts.len() > 2 && page_name.as_deref().is_some_and(|last| SUBTAG.is_match(last));
    if ends_in_section {
        subtag = page_name.take();
        page_name = Some(parts[parts.len() - 2].clone());
    }

    Some(ParsedTag { database, path_parts: parts, page_name, subtag, full_tag: tag.to_string() })
}

/// Human-readable form of a tag segment.
pub fn clean_page_name(name: &str) -> String {
    let cleaned = NUMBER_PREFIX.replace(name, "").replace('_', " ").replace('&', "and");
    match cleaned.strip_prefix('*') {
        Some(rest) => format!("{rest} (General)").trim().to_string(),
        None => cleaned.trim().to_string(),
    }
}

/// Map a tag's sub-tag segment onto one of the selectable `options`.
///
/// General (`*`) sub-tags map to "Main Tag". Without a match the cleaned
/// sub-tag is returned as is.
pub fn normalize_subtag(subtag: &str, options: &[String]) -> Option<String> {
    if subtag.is_empty() {
        return None;
    }
    if subtag.starts_with('*') {
        return Some(MAIN_TAG_PROPERTY.to_string());
    }

    let cleaned = NUMBER_PREFIX.replace(subtag, "").to_string();
    let spaced = cleaned.replace('_', " ");

    if let Some(found) = options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(&cleaned) || o.eq_ignore_ascii_case(&spaced))
    {
        return Some(found.clone());
    }

    let loose = |s: &str| s.replace(['/', '_'], " ").to_lowercase();
    let cleaned_loose = loose(&cleaned);
    options
        .iter()
        .filter(|o| !o.is_empty())
        .find(|o| {
            let option_loose = loose(o.as_str());
            option_loose.contains(&cleaned_loose) || cleaned_loose.contains(&option_loose)
        })
        .cloned()
        .or(Some(cleaned))
}

/// One display row grouping the tags that point at the same page section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimplifiedTag {
    pub display_name: String,
    pub page_name: String,
    pub subtag: Option<String>,
    pub original_tags: Vec<String>,
}

/// Group a note's tags for `database` by page and sub-tag, sorted by label.
pub fn simplify_tags(tags: &[String], database: &str, root: &str) -> Vec<SimplifiedTag> {
    let marker = format!("#{database}::");
    let mut grouped: BTreeMap<(String, Option<String>), Vec<String>> = BTreeMap::new();

    for parsed in tags
        .iter()
        .filter(|t| t.contains(&marker))
        .filter_map(|t| parse_tag(t, root))
    {
        let page_name = clean_page_name(parsed.page_name.as_deref().unwrap_or(""));
        grouped.entry((page_name, parsed.subtag)).or_default().push(parsed.full_tag);
    }

    let mut simplified: Vec<SimplifiedTag> = grouped
        .into_iter()
        .map(|((page_name, subtag), original_tags)| {
            let display_name = match &subtag {
                Some(s) => format!("{page_name} ({})", clean_page_name(s)),
                None => page_name.clone(),
            };
            SimplifiedTag { display_name, page_name, subtag, original_tags }
        })
        .collect();

    simplified.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    simplified
}

/// Tags derived from a selection of pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    pub tags: Vec<String>,
    /// Per page id, how the tag property was resolved.
    pub resolutions: Vec<(String, Resolution)>,
}

/// Property a blank tag property falls back to within `collection`.
pub fn fallback_property(collection: &str) -> &'static str {
    if collection == "Subjects" { MAIN_TAG_PROPERTY } else { TAG_PROPERTY }
}

/// Derive tags for `pages` from the chosen `property` of `collection`.
///
/// An empty property selects "Main Tag" for Subjects and Pharmacology and
/// "Tag" elsewhere. A property that is blank on a page falls back to
/// [`fallback_property`]. With no pages at all the result is the placeholder
/// `<root>::#TO_BE_TAGGED`.
pub fn tags_for_pages(pages: &[Page], collection: &str, property: &str, root: &str) -> TagSet {
    if pages.is_empty() {
        return TagSet { tags: vec![format!("{root}::#TO_BE_TAGGED")], resolutions: Vec::new() };
    }

    let primary = match property {
        "" if matches!(collection, "Subjects" | "Pharmacology") => MAIN_TAG_PROPERTY,
        "" => TAG_PROPERTY,
        other => other,
    };
    let fallback = [fallback_property(collection)];
    let fallbacks: &[&str] = if primary == fallback[0] { &[] } else { &fallback };

    let mut tags = Vec::new();
    let mut resolutions = Vec::with_capacity(pages.len());
    for page in pages {
        let resolution = page.resolve_property(primary, fallbacks);
        match &resolution {
            Resolution::FellBackTo { property, .. } => {
                tracing::debug!(page_id = %page.id, wanted = primary, used = %property, "tag property fell back");
            }
            Resolution::Missing => tracing::debug!(page_id = %page.id, wanted = primary, "no tag property"),
            Resolution::Found(_) => {}
        }
        if let Some(value) = resolution.value() {
            tags.extend(value.split_whitespace().map(str::to_string));
        }
        resolutions.push((page.id.clone(), resolution));
    }

    TagSet { tags, resolutions }
}
