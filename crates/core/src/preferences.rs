//! Per-user selections remembered between runs.
//!
//! Callers load a [`Preferences`] value, pass it to whatever needs it, and
//! save it back; nothing here is global.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;

pub const PREFERENCES_FILE: &str = "preferences.json";

/// Last-used selections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub last_collection: Option<String>,

    #[serde(default)]
    pub last_property: Option<String>,
}

impl Preferences {
    /// Load from `dir`, defaulting when the file is missing or unreadable.
    pub async fn load(dir: &Path) -> Self {
        let path = dir.join(PREFERENCES_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable preferences");
                Self::default()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable preferences");
                Self::default()
            }
        }
    }

    pub async fn save(&self, dir: &Path) -> Result<(), Error> {
        let path = dir.join(PREFERENCES_FILE);
        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(&path, bytes).await.map_err(|e| Error::io(&path, e))
    }

    /// Record a selection; an empty property clears the remembered one.
    pub fn remember(&mut self, collection: &str, property: Option<&str>) {
        self.last_collection = Some(collection.to_string());
        if let Some(property) = property {
            self.last_property = (!property.is_empty()).then(|| property.to_string());
        }
    }
}
