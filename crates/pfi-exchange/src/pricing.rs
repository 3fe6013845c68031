//! Quote pricing.
//!
//! `payout = round(payin * payoutUnitsPerPayinUnit, 2)`, midpoint away from
//! zero. Currency codes are copied from the offering; the quote expires a
//! fixed time after it is priced.

use chrono::{DateTime, Duration, Utc};
use pfi_types::{Offering, PfiError, QuoteAmount, QuoteData, Result, constants};
use rust_decimal::{Decimal, RoundingStrategy};

/// Pay-out amount for `payin` at `rate`.
///
/// # Errors
/// Returns [`PfiError::OfferingRequirementsNotMet`] if the product overflows.
pub fn quote_payout(payin: Decimal, rate: Decimal) -> Result<Decimal> {
    payin
        .checked_mul(rate)
        .map(|p| {
            p.round_dp_with_strategy(
                constants::PAYOUT_DECIMAL_PLACES,
                RoundingStrategy::MidpointAwayFromZero,
            )
        })
        .ok_or_else(|| PfiError::OfferingRequirementsNotMet {
            reason: format!("pay-in amount {payin} is too large to price"),
        })
}

/// Price an RFQ's pay-in against `offering`.
pub fn build_quote(
    offering: &Offering,
    payin: Decimal,
    priced_at: DateTime<Utc>,
    ttl: Duration,
) -> Result<QuoteData> {
    let payout = quote_payout(payin, offering.payout_units_per_payin_unit)?;
    Ok(QuoteData {
        expires_at: priced_at + ttl,
        payin: QuoteAmount {
            currency_code: offering.payin.currency_code.clone(),
            amount: payin,
            fee: None,
        },
        payout: QuoteAmount {
            currency_code: offering.payout.currency_code.clone(),
            amount: payout,
            fee: None,
        },
    })
}
