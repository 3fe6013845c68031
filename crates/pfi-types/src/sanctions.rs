//! Sanctions roster entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One sanctioned party. Rosters are refreshed wholesale, never edited entry by entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanctionsEntry {
    pub name: String,
    /// Country as published by the source list; may be empty.
    #[serde(default)]
    pub country: String,
    /// Any remaining source columns (program, type, remarks, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SanctionsEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn has_country(&self) -> bool {
        !self.country.trim().is_empty()
    }
}
