//! # Offering: a PFI's published exchange terms
//!
//! An [`Offering`] names a currency pair, the payment methods accepted on each
//! leg, the conversion rate, and which credentials a customer must present.
//! It is signed by the publishing PFI and **immutable once published**.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Did, OfferingId, PfiError, Result, Signer, constants, verify_detached};

/// A payment method accepted on one leg of an offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    /// Method kind, e.g. `GHS_BANK_TRANSFER`.
    pub kind: String,
    /// Estimated settlement time in seconds (pay-out legs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_settlement_time: Option<u64>,
}

impl PaymentMethod {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            estimated_settlement_time: None,
        }
    }

    #[must_use]
    pub fn with_settlement_time(mut self, secs: u64) -> Self {
        self.estimated_settlement_time = Some(secs);
        self
    }
}

/// Currency and accepted methods for one leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTerms {
    pub currency_code: String,
    pub methods: Vec<PaymentMethod>,
}

impl PaymentTerms {
    /// Returns `true` if `kind` is one of this leg's methods.
    #[must_use]
    pub fn accepts(&self, kind: &str) -> bool {
        self.methods.iter().any(|m| m.kind == kind)
    }
}

/// One required credential: its type and the only issuer trusted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub id: String,
    pub credential_type: String,
    pub issuer: Did,
}

/// The credentials an offering requires. Every descriptor must be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationDefinition {
    pub id: String,
    pub input_descriptors: Vec<InputDescriptor>,
}

impl PresentationDefinition {
    /// A definition with a single descriptor.
    #[must_use]
    pub fn single(credential_type: &str, issuer: Did) -> Self {
        Self {
            id: format!("{}-required", credential_type.to_lowercase()),
            input_descriptors: vec![InputDescriptor {
                id: credential_type.to_lowercase(),
                credential_type: credential_type.to_string(),
                issuer,
            }],
        }
    }
}

/// Exchange terms published by a PFI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    pub id: OfferingId,
    pub description: String,
    /// DID of the publishing PFI.
    pub pfi: Did,
    pub payin: PaymentTerms,
    pub payout: PaymentTerms,
    pub payout_units_per_payin_unit: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_claims: Option<PresentationDefinition>,
    pub created_at: DateTime<Utc>,
    /// Hex-encoded ed25519 signature by `pfi`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Borrowed view of every signed field.
#[derive(Serialize)]
struct SigningView<'a> {
    id: &'a OfferingId,
    description: &'a str,
    pfi: &'a Did,
    payin: &'a PaymentTerms,
    payout: &'a PaymentTerms,
    payout_units_per_payin_unit: &'a Decimal,
    required_claims: &'a Option<PresentationDefinition>,
    created_at: &'a DateTime<Utc>,
}

impl Offering {
    /// Canonical signing payload.
    ///
    /// Format: `"pfi:offering:v1:" || json(all fields except signature)`
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let view = SigningView {
            id: &self.id,
            description: &self.description,
            pfi: &self.pfi,
            payin: &self.payin,
            payout: &self.payout,
            payout_units_per_payin_unit: &self.payout_units_per_payin_unit,
            required_claims: &self.required_claims,
            created_at: &self.created_at,
        };
        let mut payload = constants::OFFERING_SIGNING_DOMAIN.to_vec();
        serde_json::to_writer(&mut payload, &view)?;
        Ok(payload)
    }

    /// Sign as the publishing PFI.
    ///
    /// # Errors
    /// Returns [`PfiError::SignerMismatch`] if `signer` is not `self.pfi`.
    pub fn sign(&mut self, signer: &dyn Signer) -> Result<()> {
        if signer.did() != &self.pfi {
            return Err(PfiError::SignerMismatch {
                signer: signer.did().clone(),
                sender: self.pfi.clone(),
            });
        }
        let payload = self.signing_payload()?;
        self.signature = Some(signer.sign(&payload)?);
        Ok(())
    }

    /// Returns `true` if the signature verifies against the publishing PFI.
    #[must_use]
    pub fn verify(&self) -> bool {
        let (Some(signature), Ok(payload)) = (&self.signature, self.signing_payload()) else {
            return false;
        };
        verify_detached(&self.pfi, &payload, signature)
    }

    /// Currency pair label, e.g. `USD/KES`.
    #[must_use]
    pub fn pair(&self) -> String {
        format!("{}/{}", self.payin.currency_code, self.payout.currency_code)
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Offering fixtures for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Offering {
    /// An unsigned USD→KES offering at 120.5 requiring a known-customer
    /// credential from `issuer`.
    #[must_use]
    pub fn sample(pfi: Did, issuer: Did) -> Self {
        Self {
            id: OfferingId::new("usd-to-kes"),
            description: "Exchange your US dollars for Kenyan shillings".to_string(),
            pfi,
            payin: PaymentTerms {
                currency_code: "USD".to_string(),
                methods: vec![PaymentMethod::new("USD_BANK_TRANSFER")],
            },
            payout: PaymentTerms {
                currency_code: "KES".to_string(),
                methods: vec![PaymentMethod::new("KES_BANK_TRANSFER").with_settlement_time(86_400)],
            },
            payout_units_per_payin_unit: Decimal::new(1205, 1),
            required_claims: Some(PresentationDefinition::single(
                constants::KNOWN_CUSTOMER_CREDENTIAL,
                issuer,
            )),
            created_at: Utc::now(),
            signature: None,
        }
    }
}
