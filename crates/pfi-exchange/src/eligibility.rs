//! Offering eligibility: do an RFQ's claims and selections satisfy an offering?
//!
//! A descriptor is satisfied by a claim that
//! 1. declares the required credential type,
//! 2. names the required issuer,
//! 3. verifies against that issuer's key, and
//! 4. has not expired.
//!
//! Every descriptor needs at least one such claim. Other claim content is
//! ignored. No descriptor at all means "always satisfied".

use chrono::{DateTime, Utc};
use pfi_types::{
    Credential, InputDescriptor, Offering, PfiError, PresentationDefinition, Result, RfqData,
};

/// Does `claims` satisfy `required` right now?
#[must_use]
pub fn satisfies(required: Option<&PresentationDefinition>, claims: &[Credential]) -> bool {
    satisfies_at(required, claims, Utc::now())
}

/// Does `claims` satisfy `required` at `now`?
#[must_use]
pub fn satisfies_at(
    required: Option<&PresentationDefinition>,
    claims: &[Credential],
    now: DateTime<Utc>,
) -> bool {
    required.is_none_or(|definition| {
        definition
            .input_descriptors
            .iter()
            .all(|descriptor| claims.iter().any(|c| matches(descriptor, c, now)))
    })
}

/// The claims that satisfy at least one descriptor of `required`, in input
/// order. Without a definition nothing needs presenting.
#[must_use]
pub fn select_claims<'a>(
    required: Option<&PresentationDefinition>,
    claims: &'a [Credential],
) -> Vec<&'a Credential> {
    let Some(definition) = required else {
        return Vec::new();
    };
    let now = Utc::now();
    claims
        .iter()
        .filter(|c| definition.input_descriptors.iter().any(|d| matches(d, c, now)))
        .collect()
}

fn matches(descriptor: &InputDescriptor, claim: &Credential, now: DateTime<Utc>) -> bool {
    claim.has_type(&descriptor.credential_type)
        && claim.issuer == descriptor.issuer
        && !claim.is_expired_at(now)
        && claim.verify()
}

/// Validate an RFQ body against the offering it names.
///
/// # Errors
/// Returns [`PfiError::OfferingRequirementsNotMet`] naming the first failed check.
pub fn check_offering_requirements(
    offering: &Offering,
    rfq: &RfqData,
    now: DateTime<Utc>,
) -> Result<()> {
    let unmet = |reason: String| Err(PfiError::OfferingRequirementsNotMet { reason });

    if rfq.offering_id != offering.id {
        return unmet(format!(
            "RFQ names offering {}, checked against {}",
            rfq.offering_id, offering.id
        ));
    }
    if rfq.payin.amount <= rust_decimal::Decimal::ZERO {
        return unmet(format!("pay-in amount {} must be positive", rfq.payin.amount));
    }
    if !offering.payin.accepts(&rfq.payin.kind) {
        return unmet(format!(
            "pay-in method {} not offered for {}",
            rfq.payin.kind, offering.payin.currency_code
        ));
    }
    if !offering.payout.accepts(&rfq.payout.kind) {
        return unmet(format!(
            "pay-out method {} not offered for {}",
            rfq.payout.kind, offering.payout.currency_code
        ));
    }
    if !satisfies_at(offering.required_claims.as_ref(), &rfq.claims, now) {
        return unmet("submitted claims do not satisfy the offering's required credentials".into());
    }
    Ok(())
}
