//! Fuzzy multi-term search over cached pages.
//!
//! A page matches when every query token is a prefix of some spelling
//! variation of some word in the page's search term. Matches are ranked by a
//! weighted score, with literal matches always listed first.

pub mod variations;

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use similar::TextDiff;

use crate::page::Page;

pub use variations::{tokenize, variations};

/// Queries shorter than this (ignoring whitespace) return nothing.
pub const MIN_QUERY_CHARS: usize = 3;

const EXACT_WEIGHT: f64 = 0.4;
const TITLE_WEIGHT: f64 = 0.3;
const FREQUENCY_WEIGHT: f64 = 0.2;
const SIMILARITY_WEIGHT: f64 = 0.1;

/// Title score when only some query tokens appear in the title.
const PARTIAL_TITLE_SCORE: f64 = 0.9;

/// A matching page with its ranking inputs.
#[derive(Debug, Clone)]
pub struct Ranked<'a> {
    pub page: &'a Page,
    /// Full query occurs verbatim in the search term.
    pub exact: bool,
    pub score: f64,
    title_key: String,
}

/// Score and order every page matching `query`.
pub fn rank<'a>(pages: &'a [Page], query: &str) -> Vec<Ranked<'a>> {
    let query = query.trim().to_lowercase();
    if query.chars().filter(|c| !c.is_whitespace()).count() < MIN_QUERY_CHARS {
        return Vec::new();
    }

    let tokens = tokenize(&query);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut matcher = Matcher::default();
    let mut ranked: Vec<Ranked<'a>> = pages
        .iter()
        .filter_map(|page| {
            let term = page.search_term()?.to_lowercase();
            if !matcher.matches_all(&term, &tokens) {
                return None;
            }
            Some(score(page, &term, &query, &tokens))
        })
        .collect();

    ranked.sort_by(compare);

    tracing::debug!(query = %query, candidates = pages.len(), matched = ranked.len(), "ranked pages");
    ranked
}

/// Matching pages, best first.
pub fn filter(pages: &[Page], query: &str) -> Vec<Page> {
    rank(pages, query).into_iter().map(|r| r.page.clone()).collect()
}

fn score<'a>(page: &'a Page, term: &str, query: &str, tokens: &[String]) -> Ranked<'a> {
    let title = page.title().to_lowercase();

    let exact = term.contains(query);
    let exact_score = if exact { 1.0 } else { 0.0 };

    let title_score = if title.contains(query) {
        1.0
    } else if tokens.iter().any(|t| title.contains(t.as_str())) {
        PARTIAL_TITLE_SCORE
    } else {
        0.0
    };

    let occurrences: usize = tokens.iter().map(|t| term.matches(t.as_str()).count()).sum();
    let frequency_score = occurrences as f64 / tokens.len() as f64;

    let similarity = f64::from(TextDiff::from_chars(query, term).ratio());

    let score = exact_score * EXACT_WEIGHT
        + title_score * TITLE_WEIGHT
        + frequency_score * FREQUENCY_WEIGHT
        + similarity * SIMILARITY_WEIGHT;

    Ranked { page, exact, score, title_key: title }
}

/// Exact matches first, then score descending, then title ascending.
fn compare(a: &Ranked<'_>, b: &Ranked<'_>) -> Ordering {
    b.exact
        .cmp(&a.exact)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.title_key.cmp(&b.title_key))
}

/// Memoizes variation sets across the pages of one query.
#[derive(Default)]
struct Matcher {
    cache: HashMap<String, BTreeSet<String>>,
}

impl Matcher {
    fn matches_all(&mut self, term: &str, tokens: &[String]) -> bool {
        let words = tokenize(term);
        for word in &words {
            self.cache.entry(word.clone()).or_insert_with(|| variations(word));
        }

        tokens.iter().all(|token| {
            words.iter().any(|word| {
                self.cache
                    .get(word)
                    .is_some_and(|vars| vars.iter().any(|v| v.starts_with(token.as_str())))
            })
        })
    }
}
