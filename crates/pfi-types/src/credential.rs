//! # Credential: the issuer's signed attestation about a customer
//!
//! A [`Credential`] is minted once per successful sanctions screening and
//! never mutated afterwards. Customers attach credentials to an RFQ as
//! claims; a PFI accepts a claim only if its type and issuer match the
//! offering's requirements **and** the issuer's signature verifies.
//!
//! ## Security Properties
//!
//! - **Signature-bound**: signed by the issuer's ed25519 key over every field
//! - **Issuer-bound**: signing fails unless the signer *is* the declared issuer
//! - **Time-bound**: carries an expiry; expired credentials satisfy nothing

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{CredentialId, Did, PfiError, Result, Signer, constants, verify_detached};

/// The claims the issuer attests to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialClaims {
    pub name: String,
    pub country_of_residence: String,
}

/// Schema reference carried by a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSchema {
    pub id: String,
    #[serde(rename = "type")]
    pub schema_type: String,
}

impl Default for CredentialSchema {
    fn default() -> Self {
        Self {
            id: constants::CREDENTIAL_SCHEMA_ID.to_string(),
            schema_type: constants::CREDENTIAL_SCHEMA_TYPE.to_string(),
        }
    }
}

/// A signed credential issued to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: CredentialId,
    /// Credential types, e.g. `["VerifiableCredential", "KnownCustomerCredential"]`.
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: Did,
    /// Opaque subject identifier; not validated here.
    pub subject: String,
    pub claims: CredentialClaims,
    pub schema: CredentialSchema,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Hex-encoded ed25519 signature by `issuer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Borrowed view of every signed field (everything but the signature).
#[derive(Serialize)]
struct SigningView<'a> {
    id: &'a CredentialId,
    types: &'a [String],
    issuer: &'a Did,
    subject: &'a str,
    claims: &'a CredentialClaims,
    schema: &'a CredentialSchema,
    issued_at: &'a DateTime<Utc>,
    expires_at: &'a DateTime<Utc>,
}

impl Credential {
    /// Build an unsigned credential valid for `validity` from `issued_at`.
    #[must_use]
    pub fn new(
        credential_type: &str,
        issuer: Did,
        subject: impl Into<String>,
        claims: CredentialClaims,
        issued_at: DateTime<Utc>,
        validity: Duration,
    ) -> Self {
        Self {
            id: CredentialId::new(),
            types: vec![
                "VerifiableCredential".to_string(),
                credential_type.to_string(),
            ],
            issuer,
            subject: subject.into(),
            claims,
            schema: CredentialSchema::default(),
            issued_at,
            expires_at: issued_at + validity,
            signature: None,
        }
    }

    /// Canonical signing payload: domain separator followed by the JSON of
    /// every field except the signature.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let view = SigningView {
            id: &self.id,
            types: &self.types,
            issuer: &self.issuer,
            subject: &self.subject,
            claims: &self.claims,
            schema: &self.schema,
            issued_at: &self.issued_at,
            expires_at: &self.expires_at,
        };
        let mut payload = constants::CREDENTIAL_SIGNING_DOMAIN.to_vec();
        serde_json::to_writer(&mut payload, &view)?;
        Ok(payload)
    }

    /// Sign as the issuer.
    ///
    /// # Errors
    /// Returns [`PfiError::SignerMismatch`] if `signer` is not the declared issuer.
    pub fn sign(&mut self, signer: &dyn Signer) -> Result<()> {
        if signer.did() != &self.issuer {
            return Err(PfiError::SignerMismatch {
                signer: signer.did().clone(),
                sender: self.issuer.clone(),
            });
        }
        let payload = self.signing_payload()?;
        self.signature = Some(signer.sign(&payload)?);
        Ok(())
    }

    /// Returns `true` if the signature verifies against the declared issuer.
    #[must_use]
    pub fn verify(&self) -> bool {
        let (Some(signature), Ok(payload)) = (&self.signature, self.signing_payload()) else {
            return false;
        };
        verify_detached(&self.issuer, &payload, signature)
    }

    /// Returns `true` if the credential declares `credential_type`.
    #[must_use]
    pub fn has_type(&self, credential_type: &str) -> bool {
        self.types.iter().any(|t| t == credential_type)
    }

    /// Returns `true` if the credential has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
