//! Read-only offering catalog.

use std::collections::BTreeMap;

use async_trait::async_trait;
use pfi_types::{Offering, OfferingId, Result, Signer};

/// Lookup of the offerings one PFI publishes.
#[async_trait]
pub trait OfferingCatalog: Send + Sync {
    /// The offering with `id`, or `None` if not published.
    async fn get_offering(&self, id: &OfferingId) -> Result<Option<Offering>>;

    /// Every published offering, ordered by id.
    async fn list_offerings(&self) -> Result<Vec<Offering>>;
}

/// Fixed catalog held in memory. Built once during startup, never mutated.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    offerings: BTreeMap<OfferingId, Offering>,
}

impl InMemoryCatalog {
    /// Catalog of already-signed (or deliberately unsigned) offerings.
    #[must_use]
    pub fn new(offerings: impl IntoIterator<Item = Offering>) -> Self {
        Self {
            offerings: offerings.into_iter().map(|o| (o.id.clone(), o)).collect(),
        }
    }

    /// Sign every offering with the publishing PFI's identity, then build the catalog.
    ///
    /// # Errors
    /// Returns [`pfi_types::PfiError::SignerMismatch`] if an offering names a
    /// different PFI than `signer`.
    pub fn signed(offerings: impl IntoIterator<Item = Offering>, signer: &dyn Signer) -> Result<Self> {
        let offerings = offerings
            .into_iter()
            .map(|mut o| {
                o.sign(signer)?;
                Ok(o)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(offerings))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offerings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offerings.is_empty()
    }
}

#[async_trait]
impl OfferingCatalog for InMemoryCatalog {
    async fn get_offering(&self, id: &OfferingId) -> Result<Option<Offering>> {
        Ok(self.offerings.get(id).cloned())
    }

    async fn list_offerings(&self) -> Result<Vec<Offering>> {
        Ok(self.offerings.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use pfi_types::{BearerIdentity, PfiError};

    use super::*;

    #[tokio::test]
    async fn signed_catalog_serves_verifiable_offerings() {
        let pfi = BearerIdentity::deterministic(1);
        let issuer = BearerIdentity::deterministic(2);
        let catalog = InMemoryCatalog::signed(
            [Offering::sample(pfi.did().clone(), issuer.did().clone())],
            &pfi,
        )
        .unwrap();
        let offering = catalog
            .get_offering(&OfferingId::new("usd-to-kes"))
            .await
            .unwrap()
            .unwrap();
        assert!(offering.verify());
        assert_eq!(catalog.list_offerings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_offering_is_none() {
        let catalog = InMemoryCatalog::default();
        assert!(
            catalog
                .get_offering(&OfferingId::new("nope"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn signing_someone_elses_offering_fails() {
        let pfi = BearerIdentity::deterministic(1);
        let other = BearerIdentity::deterministic(3);
        let issuer = BearerIdentity::deterministic(2);
        let err = InMemoryCatalog::signed(
            [Offering::sample(pfi.did().clone(), issuer.did().clone())],
            &other,
        )
        .unwrap_err();
        assert!(matches!(err, PfiError::SignerMismatch { .. }));
    }
}
