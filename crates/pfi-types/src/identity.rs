//! Decentralized identifiers and signing identities.
//!
//! Every party (customer wallet, PFI, credential issuer) is named by a [`Did`].
//! The workspace uses a self-certifying `did:key:` form whose method-specific
//! id is the hex-encoded ed25519 public key, so verifying a signature against
//! a DID never needs a resolver round trip.
//!
//! Key material stays behind the [`Signer`] trait: the exchange and compliance
//! code only ever asks an identity to sign a payload, never touches keys.

use std::{fmt, str::FromStr};

use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::{PfiError, Result, constants};

// ---------------------------------------------------------------------------
// Did
// ---------------------------------------------------------------------------

/// A decentralized identifier, e.g. `did:key:3b6a27bc...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    /// Parse and shape-check a DID string (`did:<method>:<id>`).
    ///
    /// # Errors
    /// Returns [`PfiError::InvalidDid`] if the string is not DID-shaped.
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("did"), Some(method), Some(id)) if !method.is_empty() && !id.is_empty() => {
                Ok(Self(s))
            }
            _ => Err(PfiError::InvalidDid(s)),
        }
    }

    /// The `did:key:` DID for an ed25519 verifying key.
    #[must_use]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(format!(
            "{}{}",
            constants::DID_KEY_PREFIX,
            hex::encode(key.as_bytes())
        ))
    }

    /// Resolve this DID to its ed25519 verifying key.
    ///
    /// # Errors
    /// Returns [`PfiError::InvalidDid`] if the DID is not a well-formed `did:key:`.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        let encoded = self
            .0
            .strip_prefix(constants::DID_KEY_PREFIX)
            .ok_or_else(|| PfiError::InvalidDid(self.0.clone()))?;
        let bytes: [u8; 32] = hex::decode(encoded)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| PfiError::InvalidDid(self.0.clone()))?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| PfiError::InvalidDid(self.0.clone()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters of the method-specific id, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        let id = self.0.rsplit(':').next().unwrap_or(&self.0);
        id.chars().take(8).collect()
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Did {
    type Err = PfiError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Something that can produce detached signatures on behalf of a DID.
pub trait Signer: Send + Sync {
    /// The DID this signer signs for.
    fn did(&self) -> &Did;

    /// Produce a hex-encoded detached signature over `payload`.
    ///
    /// # Errors
    /// Implementations backed by remote key stores may fail.
    fn sign(&self, payload: &[u8]) -> Result<String>;
}

/// Verify a hex-encoded detached signature against the key behind `did`.
///
/// Never errors: any malformed input simply fails verification.
#[must_use]
pub fn verify_detached(did: &Did, payload: &[u8], signature_hex: &str) -> bool {
    let Ok(key) = did.verifying_key() else {
        return false;
    };
    let Some(bytes) = hex::decode(signature_hex)
        .ok()
        .and_then(|b| <[u8; 64]>::try_from(b).ok())
    else {
        return false;
    };
    key.verify_strict(payload, &Signature::from_bytes(&bytes))
        .is_ok()
}

// ---------------------------------------------------------------------------
// BearerIdentity
// ---------------------------------------------------------------------------

/// An in-process ed25519 identity that holds its own private key.
#[derive(Clone)]
pub struct BearerIdentity {
    did: Did,
    signing_key: SigningKey,
}

impl BearerIdentity {
    /// Generate a fresh identity from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Rebuild an identity from its 32-byte secret.
    #[must_use]
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(secret))
    }

    /// Rebuild an identity from a hex-encoded 32-byte secret.
    ///
    /// # Errors
    /// Returns [`PfiError::Configuration`] if the hex is malformed.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes: [u8; 32] = hex::decode(secret_hex.trim())
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| {
                PfiError::Configuration("secret key must be 32 hex-encoded bytes".to_string())
            })?;
        Ok(Self::from_secret_bytes(&bytes))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let did = Did::from_verifying_key(&signing_key.verifying_key());
        Self { did, signing_key }
    }

    /// Hex-encoded secret, for writing a portable key file.
    #[must_use]
    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl Signer for BearerIdentity {
    fn did(&self) -> &Did {
        &self.did
    }

    fn sign(&self, payload: &[u8]) -> Result<String> {
        Ok(hex::encode(self.signing_key.sign(payload).to_bytes()))
    }
}

impl fmt::Debug for BearerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerIdentity")
            .field("did", &self.did)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

/// Deterministic identities for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl BearerIdentity {
    /// Identity whose secret is `[seed; 32]`.
    #[must_use]
    pub fn deterministic(seed: u8) -> Self {
        Self::from_secret_bytes(&[seed; 32])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn did_parse_accepts_did_shapes() {
        assert!(Did::parse("did:dht:abc123").is_ok());
        assert!(Did::parse("did:key:00ff").is_ok());
    }

    #[test]
    fn did_parse_rejects_non_dids() {
        assert!(Did::parse("alice").is_err());
        assert!(Did::parse("did:key:").is_err());
        assert!(Did::parse("did::abc").is_err());
        assert!(Did::parse("uri:key:abc").is_err());
    }

    #[test]
    fn did_resolves_to_own_key() {
        let id = BearerIdentity::deterministic(7);
        let key = id.did().verifying_key().unwrap();
        assert_eq!(key, id.verifying_key());
    }

    #[test]
    fn foreign_did_method_does_not_resolve() {
        let did = Did::parse("did:dht:kdqnzqsoedntcfmcgrxshr7ek93ep1ezn").unwrap();
        assert!(matches!(did.verifying_key(), Err(PfiError::InvalidDid(_))));
    }

    #[test]
    fn sign_then_verify() {
        let id = BearerIdentity::deterministic(1);
        let sig = id.sign(b"hello").unwrap();
        assert!(verify_detached(id.did(), b"hello", &sig));
    }

    #[test]
    fn verify_rejects_mutated_payload() {
        let id = BearerIdentity::deterministic(1);
        let sig = id.sign(b"hello").unwrap();
        assert!(!verify_detached(id.did(), b"hellO", &sig));
    }

    #[test]
    fn verify_rejects_other_signer() {
        let alice = BearerIdentity::deterministic(1);
        let mallory = BearerIdentity::deterministic(2);
        let sig = mallory.sign(b"hello").unwrap();
        assert!(!verify_detached(alice.did(), b"hello", &sig));
    }

    #[test]
    fn verify_tolerates_garbage_signature() {
        let id = BearerIdentity::deterministic(1);
        assert!(!verify_detached(id.did(), b"hello", "zz"));
        assert!(!verify_detached(id.did(), b"hello", ""));
    }

    #[test]
    fn secret_hex_roundtrip() {
        let id = BearerIdentity::generate();
        let back = BearerIdentity::from_secret_hex(&id.secret_hex()).unwrap();
        assert_eq!(id.did(), back.did());
    }

    #[test]
    fn debug_redacts_secret() {
        let id = BearerIdentity::deterministic(3);
        let dbg = format!("{id:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains(&id.secret_hex()));
    }
}
