//! Credential issuer: screens a customer, then signs a known-customer credential.
//!
//! A sanctions hit is a terminal [`IssuanceOutcome::Refused`], never a
//! partially built credential. When the roster is unavailable the issuer
//! refuses as well (fail closed).

use std::{fmt, sync::Arc};

use chrono::{Duration, Utc};
use pfi_types::{Credential, CredentialClaims, Did, PfiError, Result, Signer, constants};

use crate::ComplianceGate;

/// Why a credential was not issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    /// The customer matched a sanctions roster entry.
    SanctionsMatch,
    /// Screening could not run.
    ScreeningUnavailable,
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SanctionsMatch => write!(f, "sanctions match"),
            Self::ScreeningUnavailable => write!(f, "screening unavailable"),
        }
    }
}

/// Result of an issuance request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    Issued(Box<Credential>),
    Refused(RefusalReason),
}

impl IssuanceOutcome {
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Self::Issued(vc) => Some(vc),
            Self::Refused(_) => None,
        }
    }

    #[must_use]
    pub fn is_issued(&self) -> bool {
        matches!(self, Self::Issued(_))
    }
}

/// Issues `KnownCustomerCredential`s signed by the issuer identity.
pub struct CredentialIssuer {
    gate: ComplianceGate,
    identity: Arc<dyn Signer>,
    min_score: u8,
    validity: Duration,
}

impl CredentialIssuer {
    /// Issuer screening at the fixed minimum score with the standard validity window.
    #[must_use]
    pub fn new(gate: ComplianceGate, identity: Arc<dyn Signer>) -> Self {
        Self {
            gate,
            identity,
            min_score: constants::ISSUER_MIN_SCORE,
            validity: Duration::days(constants::CREDENTIAL_VALIDITY_DAYS),
        }
    }

    #[must_use]
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Screen at `min_score` instead of the standard threshold.
    #[must_use]
    pub fn with_min_score(mut self, min_score: u8) -> Self {
        self.min_score = min_score.min(constants::MAX_MATCH_SCORE);
        self
    }

    #[must_use]
    pub fn did(&self) -> &Did {
        self.identity.did()
    }

    /// Screen `name`/`country` and, if clear, issue a signed credential to `subject`.
    ///
    /// # Errors
    /// Returns [`PfiError::MalformedMessage`] for a blank name and propagates
    /// signing failures. Sanctions hits and an unavailable roster are refusals.
    pub fn issue(&self, name: &str, country: &str, subject: &str) -> Result<IssuanceOutcome> {
        if name.trim().is_empty() {
            return Err(PfiError::MalformedMessage {
                reason: "credential request needs a name".to_string(),
            });
        }

        let country_query = Some(country).filter(|c| !c.trim().is_empty());
        match self.gate.hits(name, country_query, self.min_score) {
            Ok(hits) if !hits.is_empty() => {
                tracing::warn!(
                    subject,
                    hits = hits.len(),
                    top_name_score = hits.iter().map(|h| h.name_score).max().unwrap_or(0),
                    "credential refused: sanctions match"
                );
                return Ok(IssuanceOutcome::Refused(RefusalReason::SanctionsMatch));
            }
            Ok(_) => {}
            Err(PfiError::RosterUnavailable { reason }) => {
                tracing::warn!(subject, %reason, "credential refused: screening unavailable");
                return Ok(IssuanceOutcome::Refused(RefusalReason::ScreeningUnavailable));
            }
            Err(e) => return Err(e),
        }

        let mut credential = Credential::new(
            constants::KNOWN_CUSTOMER_CREDENTIAL,
            self.identity.did().clone(),
            subject,
            CredentialClaims {
                name: name.trim().to_string(),
                country_of_residence: country.trim().to_string(),
            },
            Utc::now(),
            self.validity,
        );
        credential.sign(self.identity.as_ref())?;

        tracing::info!(
            subject,
            credential_id = %credential.id,
            expires_at = %credential.expires_at,
            "known-customer credential issued"
        );
        Ok(IssuanceOutcome::Issued(Box::new(credential)))
    }
}

impl fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("did", self.identity.did())
            .field("min_score", &self.min_score)
            .field("validity_days", &self.validity.num_days())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use pfi_types::{BearerIdentity, MatchPolicy, SanctionsEntry};

    use super::*;
    use crate::{SanctionsRoster, StaticRoster};

    fn issuer_with(roster: SanctionsRoster) -> (CredentialIssuer, BearerIdentity) {
        let identity = BearerIdentity::deterministic(42);
        let gate = ComplianceGate::new(Arc::new(roster), MatchPolicy::Either);
        (
            CredentialIssuer::new(gate, Arc::new(identity.clone())),
            identity,
        )
    }

    fn demo_roster() -> SanctionsRoster {
        SanctionsRoster::preloaded(vec![SanctionsEntry::new("John Doe", "Nowhereland")])
    }

    #[test]
    fn sanctioned_name_is_refused() {
        let (issuer, _) = issuer_with(demo_roster());
        let outcome = issuer.issue("John Doe", "Nowhereland", "did:key:abc").unwrap();
        assert_eq!(outcome, IssuanceOutcome::Refused(RefusalReason::SanctionsMatch));
        assert!(outcome.credential().is_none());
    }

    #[test]
    fn clear_customer_gets_verifiable_credential() {
        let (issuer, identity) = issuer_with(demo_roster());
        let outcome = issuer.issue("Jane Roe", "Freedonia", "did:key:abc").unwrap();
        let vc = outcome.credential().unwrap();
        assert!(vc.verify());
        assert_eq!(&vc.issuer, identity.did());
        assert_eq!(vc.subject, "did:key:abc");
        assert_eq!(vc.claims.name, "Jane Roe");
        assert_eq!(vc.claims.country_of_residence, "Freedonia");
        assert!(vc.has_type(constants::KNOWN_CUSTOMER_CREDENTIAL));
        assert_eq!(
            (vc.expires_at - vc.issued_at).num_days(),
            constants::CREDENTIAL_VALIDITY_DAYS
        );
    }

    #[test]
    fn unloaded_roster_refuses() {
        let (issuer, _) = issuer_with(SanctionsRoster::new(Arc::new(StaticRoster::default())));
        let outcome = issuer.issue("Jane Roe", "Freedonia", "did:key:abc").unwrap();
        assert_eq!(
            outcome,
            IssuanceOutcome::Refused(RefusalReason::ScreeningUnavailable)
        );
    }

    #[test]
    fn blank_name_is_rejected() {
        let (issuer, _) = issuer_with(demo_roster());
        assert!(matches!(
            issuer.issue("  ", "Freedonia", "did:key:abc"),
            Err(PfiError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn custom_validity_window() {
        let (issuer, _) = issuer_with(demo_roster());
        let issuer = issuer.with_validity(Duration::days(30));
        let outcome = issuer.issue("Jane Roe", "", "did:key:abc").unwrap();
        let vc = outcome.credential().unwrap();
        assert_eq!((vc.expires_at - vc.issued_at).num_days(), 30);
    }
}
