//! Customer-side message builder.
//!
//! ```text
//!   offerings ──► rfq() ──► Quote ──► order() ──► OrderStatus* ──► Close
//!                   │                                 ▲
//!                   └── close() at any point ─────────┘
//! ```
//!
//! [`Wallet::rfq`] refuses to build a request the PFI would reject: the
//! offering must carry a valid signature and the selection plus the claims
//! presented must pass [`check_offering_requirements`]. Only claims that
//! satisfy one of the offering's descriptors are attached.

use std::{fmt, sync::Arc};

use chrono::Utc;
use pfi_exchange::{check_offering_requirements, select_claims};
use pfi_types::{
    CloseData, Credential, Did, ExchangeId, MessageData, Offering, OrderData, PfiError,
    ProtocolMessage, Result, RfqData, SelectedPayin, SelectedPayout, Signer,
};

/// One customer identity and the messages it signs.
#[derive(Clone)]
pub struct Wallet {
    identity: Arc<dyn Signer>,
}

impl Wallet {
    #[must_use]
    pub fn new(identity: Arc<dyn Signer>) -> Self {
        Self { identity }
    }

    #[must_use]
    pub fn did(&self) -> &Did {
        self.identity.did()
    }

    /// Signed RFQ opening a new exchange against `offering`.
    ///
    /// # Errors
    /// - [`PfiError::SignatureInvalid`] if the offering is not signed by its PFI
    /// - [`PfiError::OfferingRequirementsNotMet`] if the selection or the
    ///   available credentials do not meet the offering
    pub fn rfq(
        &self,
        offering: &Offering,
        payin: SelectedPayin,
        payout: SelectedPayout,
        credentials: &[Credential],
    ) -> Result<ProtocolMessage> {
        if !offering.verify() {
            return Err(PfiError::SignatureInvalid {
                reason: format!("offering {} is not signed by {}", offering.id, offering.pfi),
            });
        }

        let claims = select_claims(offering.required_claims.as_ref(), credentials)
            .into_iter()
            .cloned()
            .collect();
        let data = RfqData {
            offering_id: offering.id.clone(),
            payin,
            payout,
            claims,
        };
        check_offering_requirements(offering, &data, Utc::now())?;

        let rfq = ProtocolMessage::rfq(self.did().clone(), offering.pfi.clone(), data)
            .signed(self.identity.as_ref())?;
        tracing::debug!(
            exchange_id = %rfq.exchange_id(),
            offering_id = %offering.id,
            pfi = %offering.pfi.short(),
            "rfq built"
        );
        Ok(rfq)
    }

    /// Signed Order accepting the quote in `exchange_id`.
    pub fn order(&self, pfi: &Did, exchange_id: ExchangeId) -> Result<ProtocolMessage> {
        self.reply(pfi, exchange_id, MessageData::Order(OrderData {}))
    }

    /// Signed Close ending `exchange_id` from the customer's side.
    pub fn close(
        &self,
        pfi: &Did,
        exchange_id: ExchangeId,
        reason: impl Into<String>,
    ) -> Result<ProtocolMessage> {
        self.reply(
            pfi,
            exchange_id,
            MessageData::Close(CloseData {
                reason: Some(reason.into()),
                success: None,
            }),
        )
    }

    fn reply(&self, pfi: &Did, exchange_id: ExchangeId, data: MessageData) -> Result<ProtocolMessage> {
        ProtocolMessage::new(self.did().clone(), pfi.clone(), exchange_id, data)
            .signed(self.identity.as_ref())
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet").field("did", self.did()).finish()
    }
}
