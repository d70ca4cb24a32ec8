//! Static collection registry.
//!
//! Maps a human collection name to the remote database id that names its
//! snapshot file, plus the sub-tag properties selectable for that collection.
//! The registry is fixed once built from configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A single remote collection (one Notion database).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Collection {
    /// Display name, e.g. "Subjects".
    pub name: String,

    /// Remote database id; also the snapshot file stem.
    pub id: String,

    /// Selectable sub-tag properties. The empty string stands for the main tag.
    #[serde(default)]
    pub properties: Vec<String>,
}

impl Collection {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self { name: name.into(), id: id.into(), properties: vec![String::new()] }
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }
}

/// Ordered, read-only set of collections.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    collections: Vec<Collection>,
}

impl Registry {
    pub fn new(collections: Vec<Collection>) -> Self {
        Self { collections }
    }

    /// Look up a collection by name (case-insensitive) or by remote id.
    pub fn get(&self, key: &str) -> Result<&Collection, Error> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidInput("collection name must not be empty".into()));
        }
        self.collections
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(key) || c.id == key)
            .ok_or_else(|| Error::UnknownCollection(key.to_string()))
    }

    /// Human label for a remote id, "Unknown Database" if unregistered.
    pub fn name_of(&self, id: &str) -> &str {
        self.collections
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
            .unwrap_or("Unknown Database")
    }

    pub fn first(&self) -> Option<&Collection> {
        self.collections.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.collections.iter()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

const CLINICAL_SECTIONS: &[&str] = &[
    "",
    "Epidemiology",
    "Aetiology",
    "Risk Factors",
    "Physiology/Anatomy",
    "Pathophysiology",
    "Clinical Features",
    "Pathology",
    "Diagnosis/Investigations",
    "Scoring Criteria",
    "Management",
    "Complications/Prognosis",
    "Screening/Prevention",
];

const DRUG_SECTIONS: &[&str] = &[
    "Generic Names",
    "Mechanism of Action",
    "Indications",
    "Contraindications/Precautions",
    "Route/Frequency",
    "Adverse Effects",
    "Toxicity & Reversal",
    "Advantages/Disadvantages",
    "Monitoring",
];

/// The built-in collection list.
pub fn default_collections() -> Vec<Collection> {
    let drug_sections = std::iter::once("").chain(DRUG_SECTIONS.iter().copied());
    let guideline_sections = CLINICAL_SECTIONS.iter().chain(DRUG_SECTIONS.iter()).copied();

    vec![
        Collection::new("Subjects", "2674b67cbdf84a11a057a29cc24c524f")
            .with_properties(CLINICAL_SECTIONS.iter().copied()),
        Collection::new("Pharmacology", "9ff96451736d43909d49e3b9d60971f8").with_properties(drug_sections),
        Collection::new("eTG", "22282971487f4f559dce199476709b03").with_properties(guideline_sections),
        Collection::new("Rotation", "69b3e7fdce1548438b26849466d7c18e"),
        Collection::new("Textbooks", "13d5964e68a480bfb07cf7e2f1786075"),
        Collection::new("Guidelines", "13d5964e68a48056b40de8148dd91a06"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_id() {
        let registry = Registry::new(default_collections());
        let by_name = registry.get("subjects").unwrap();
        let by_id = registry.get("2674b67cbdf84a11a057a29cc24c524f").unwrap();
        assert_eq!(by_name, by_id);
        assert_eq!(by_name.name, "Subjects");
    }

    #[test]
    fn test_unknown_collection() {
        let registry = Registry::new(default_collections());
        assert!(matches!(registry.get("Anatomy"), Err(Error::UnknownCollection(_))));
        assert_eq!(registry.name_of("nope"), "Unknown Database");
        assert!(matches!(registry.get("  "), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_default_properties() {
        let collections = default_collections();
        let etg = collections.iter().find(|c| c.name == "eTG").unwrap();
        assert_eq!(etg.properties.len(), CLINICAL_SECTIONS.len() + DRUG_SECTIONS.len());
        assert_eq!(etg.properties[0], "");

        let rotation = collections.iter().find(|c| c.name == "Rotation").unwrap();
        assert_eq!(rotation.properties, vec![String::new()]);
    }
}
