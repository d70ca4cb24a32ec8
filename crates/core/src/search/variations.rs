//! Tokenizing and spelling variations.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Clinical abbreviation table, applied in both directions.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("paed", &["paediatric", "paediatrics"]),
    ("paeds", &["paediatric", "paediatrics"]),
    ("emergency", &["emergencies"]),
    ("emergencies", &["emergency"]),
    ("cardio", &["cardiac", "cardiovascular"]),
    ("cardiac", &["cardiovascular", "heart"]),
    ("cardiology", &["cardio", "cardiac", "cardiovascular"]),
    ("gastro", &["gastrointestinal", "gastroenterology"]),
    ("neuro", &["neurological", "neurology"]),
    ("rheum", &["rheumatology", "rheumatological"]),
    ("haem", &["haematology", "haematological"]),
    ("onc", &["oncology", "oncological"]),
    ("endo", &["endocrinology", "endocrinological"]),
    ("pulm", &["pulmonary", "respiratory"]),
    ("resp", &["respiratory", "pulmonary"]),
    ("gyn", &["gynecology", "gynaecology"]),
    ("gynae", &["gynecology", "gynaecology"]),
    ("obs", &["obstetrics", "obstetrical"]),
    ("obgyn", &["obstetrics", "obstetrical"]),
    ("psych", &["psychiatry"]),
    ("surg", &["surgical", "surgery"]),
    ("pall", &["palliative"]),
    ("uro", &["urological", "urology"]),
];

/// Lowercase words split on whitespace and punctuation.
pub fn tokenize(text: &str) -> Vec<String> {
    NON_WORD
        .replace_all(&text.to_lowercase(), " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Every spelling of `word` that counts as the same term.
///
/// Includes the word itself, a plural/singular toggle, and any synonym group
/// the word belongs to, whether as key or as value.
pub fn variations(word: &str) -> BTreeSet<String> {
    let word = word.to_lowercase();
    let mut out = BTreeSet::new();

    if let Some(stem) = word.strip_suffix('y') {
        out.insert(format!("{stem}ies"));
    } else if let Some(stem) = word.strip_suffix('s')
        && !word.ends_with("ss")
    {
        out.insert(stem.to_string());
    }

    for (key, values) in SYNONYMS {
        if word == *key || values.contains(&word.as_str()) {
            out.insert((*key).to_string());
            out.extend(values.iter().map(|v| (*v).to_string()));
        }
    }

    out.insert(word);
    out
}
