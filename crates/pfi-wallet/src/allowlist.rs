//! PFIs a wallet is willing to list and talk to.

use pfi_types::Did;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowlistEntry {
    pub did: Did,
    pub name: String,
    /// Base URL, e.g. `http://localhost:9000`.
    pub endpoint: String,
}

/// Ordered list of trusted PFIs. A DID appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PfiAllowlist {
    entries: Vec<AllowlistEntry>,
}

impl PfiAllowlist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the entry for `did`.
    #[must_use]
    pub fn with(mut self, did: Did, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.entries.retain(|e| e.did != did);
        self.entries.push(AllowlistEntry {
            did,
            name: name.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        });
        self
    }

    #[must_use]
    pub fn contains(&self, did: &Did) -> bool {
        self.get(did).is_some()
    }

    #[must_use]
    pub fn get(&self, did: &Did) -> Option<&AllowlistEntry> {
        self.entries.iter().find(|e| &e.did == did)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AllowlistEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pfi_types::{BearerIdentity, Signer};

    use super::*;

    #[test]
    fn re_adding_replaces_the_entry() {
        let aqua = BearerIdentity::deterministic(1);
        let titanium = BearerIdentity::deterministic(5);
        let list = PfiAllowlist::new()
            .with(aqua.did().clone(), "AquaFinance Capital", "http://localhost:4000/")
            .with(titanium.did().clone(), "Titanium Trust", "http://localhost:9000")
            .with(aqua.did().clone(), "AquaFinance Capital", "http://localhost:4001");

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(aqua.did()).unwrap().endpoint, "http://localhost:4001");
        assert!(list.contains(titanium.did()));
        assert!(!list.contains(BearerIdentity::deterministic(9).did()));
    }
}
