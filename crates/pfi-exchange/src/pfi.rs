//! # Pfi: one participating financial institution's exchange handler
//!
//! Explicit handler methods replace callback registration. Each method
//! takes the per-exchange lock, rebuilds the exchange from the store,
//! validates the inbound message against it, and only then appends.
//!
//! ## Inbound Checks (every message)
//!
//! 1. Kind is the one this handler expects
//! 2. Signature verifies against `metadata.from`
//! 3. Addressed to this PFI
//! 4. Protocol version matches
//!
//! Nothing that fails a check is ever persisted.
//!
//! ## Fulfilment
//!
//! ```text
//! ORDERED ─advance─▶ IN_PROGRESS ─advance─▶ TRANSFERRING_FUNDS ─advance─▶ SUCCESS ──▶ Close(SUCCESS, true)
//! ```
//!
//! Each status is signed and appended under the lock before the adapter is
//! asked for the next one, so a restart resumes from the last durable step.

use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use pfi_types::{
    CloseData, Did, ExchangeId, ExchangeSettings, FulfillmentStatus, MessageData, MessageKind,
    Offering, OfferingId, OrderStatusData, PfiError, ProtocolMessage, Result, Signer, constants,
};

use crate::{
    Exchange, ExchangeLocks, ExchangeState, ExchangeStore, OfferingCatalog, SettlementAdapter,
    SimulatedSettlement, check_offering_requirements, pricing,
};

/// A PFI: identity, offerings, exchange log and fulfilment.
pub struct Pfi {
    name: String,
    identity: Arc<dyn Signer>,
    catalog: Arc<dyn OfferingCatalog>,
    store: Arc<dyn ExchangeStore>,
    settlement: Arc<dyn SettlementAdapter>,
    locks: ExchangeLocks,
    settings: ExchangeSettings,
    /// Customer DIDs allowed to open exchanges; empty allows everyone.
    allowlist: HashSet<Did>,
}

impl Pfi {
    /// A PFI with simulated settlement, default settings and no allowlist.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        identity: Arc<dyn Signer>,
        catalog: Arc<dyn OfferingCatalog>,
        store: Arc<dyn ExchangeStore>,
    ) -> Self {
        Self {
            name: name.into(),
            identity,
            catalog,
            store,
            settlement: Arc::new(SimulatedSettlement::new()),
            locks: ExchangeLocks::new(),
            settings: ExchangeSettings::default(),
            allowlist: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_settlement(mut self, settlement: Arc<dyn SettlementAdapter>) -> Self {
        self.settlement = settlement;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ExchangeSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_allowlist(mut self, dids: impl IntoIterator<Item = Did>) -> Self {
        self.allowlist = dids.into_iter().collect();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn did(&self) -> &Did {
        self.identity.did()
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    pub async fn offerings(&self) -> Result<Vec<Offering>> {
        self.catalog.list_offerings().await
    }

    /// # Errors
    /// [`PfiError::OfferingNotFound`] if this PFI does not publish `id`.
    pub async fn offering(&self, id: &OfferingId) -> Result<Offering> {
        self.catalog
            .get_offering(id)
            .await?
            .ok_or_else(|| PfiError::OfferingNotFound(id.clone()))
    }

    // -----------------------------------------------------------------------
    // Inbound handlers
    // -----------------------------------------------------------------------

    /// Accept an RFQ and answer with a signed, persisted Quote.
    ///
    /// Resubmitting the RFQ that opened an exchange returns the existing
    /// quote without appending anything.
    ///
    /// # Errors
    /// Signature, validation and dependency errors; on any error no Quote exists.
    pub async fn handle_rfq(&self, rfq: ProtocolMessage) -> Result<ProtocolMessage> {
        self.check_inbound(&rfq, MessageKind::Rfq)?;
        self.check_allowed(rfq.sender())?;

        let exchange_id = rfq.exchange_id();
        let _guard = self.locks.lock(exchange_id).await;

        let existing = self.store.list(exchange_id).await?;
        if !existing.is_empty() {
            return self.resubmitted_rfq(&rfq, existing).await;
        }

        let exchange = Exchange::open(rfq)?;
        let offering = self.offering(&exchange.rfq_data().offering_id).await?;
        if let Err(e) = check_offering_requirements(&offering, exchange.rfq_data(), Utc::now()) {
            tracing::warn!(
                pfi = %self.name,
                exchange_id = %exchange_id,
                error = %e,
                "RFQ rejected"
            );
            return Err(e);
        }

        let quote = self.price(&exchange, &offering)?;
        exchange.accept(&quote)?;
        self.store.append(exchange.rfq()).await?;
        self.store.append(&quote).await?;

        tracing::info!(
            pfi = %self.name,
            exchange_id = %exchange_id,
            offering_id = %offering.id,
            customer = %exchange.customer().short(),
            "RFQ quoted"
        );
        Ok(quote)
    }

    /// Accept the customer's Order against an unexpired Quote.
    ///
    /// This only records the Order; the exchange stays `Ordered` until
    /// [`fulfil`](Self::fulfil) runs (or [`resume_all`](Self::resume_all)
    /// after a restart). Transports that answer before settlement spawn
    /// `fulfil` themselves; [`process_order`](Self::process_order) does both
    /// in one call.
    pub async fn handle_order(&self, order: ProtocolMessage) -> Result<()> {
        self.check_inbound(&order, MessageKind::Order)?;
        let exchange_id = order.exchange_id();
        let _guard = self.locks.lock(exchange_id).await;

        let exchange = self.load(exchange_id).await?;
        exchange.accept(&order)?;
        if let Some(quote) = exchange.quote() {
            if quote.expires_at < Utc::now() {
                return Err(PfiError::QuoteExpired(exchange_id));
            }
        }
        self.store.append(&order).await?;

        tracing::info!(pfi = %self.name, exchange_id = %exchange_id, "order accepted");
        Ok(())
    }

    /// Accept the Order and drive the exchange to Close before returning.
    pub async fn process_order(&self, order: ProtocolMessage) -> Result<Exchange> {
        let exchange_id = order.exchange_id();
        self.handle_order(order).await?;
        self.fulfil(exchange_id).await
    }

    /// Accept a Close from the customer, ending the exchange.
    pub async fn handle_close(&self, close: ProtocolMessage) -> Result<()> {
        self.check_inbound(&close, MessageKind::Close)?;
        let exchange_id = close.exchange_id();
        let guard = self.locks.lock(exchange_id).await;

        let exchange = self.load(exchange_id).await?;
        exchange.accept(&close)?;
        self.store.append(&close).await?;

        drop(guard);
        tracing::info!(
            pfi = %self.name,
            exchange_id = %exchange_id,
            reason = close.as_close().and_then(|c| c.reason.as_deref()).unwrap_or(""),
            "exchange closed by customer"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fulfilment
    // -----------------------------------------------------------------------

    /// Drive an ordered exchange through its statuses to Close.
    ///
    /// Stops early, without error, if the exchange is closed meanwhile.
    pub async fn fulfil(&self, exchange_id: ExchangeId) -> Result<Exchange> {
        loop {
            let guard = self.locks.lock(exchange_id).await;
            let exchange = self.load(exchange_id).await?;

            let message = match exchange.state() {
                ExchangeState::Ordered => self.next_status(&exchange, None).await?,
                ExchangeState::Status(last) if last.is_terminal() => {
                    self.final_close(&exchange, last)?
                }
                ExchangeState::Status(last) => self.next_status(&exchange, Some(last)).await?,
                ExchangeState::Closed => {
                    drop(guard);
                    return Ok(exchange);
                }
                state => {
                    return Err(PfiError::ExchangeConflict {
                        exchange_id,
                        kind: MessageKind::OrderStatus,
                        reason: format!("cannot fulfil an exchange that is {state}"),
                    });
                }
            };

            exchange.accept(&message)?;
            self.store.append(&message).await?;
            tracing::info!(
                pfi = %self.name,
                exchange_id = %exchange_id,
                kind = %message.kind(),
                status = ?message.as_order_status(),
                "fulfilment step persisted"
            );
        }
    }

    async fn next_status(
        &self,
        exchange: &Exchange,
        last: Option<FulfillmentStatus>,
    ) -> Result<ProtocolMessage> {
        let next = self.settlement.advance(exchange.id(), last).await?;
        if last.is_some_and(|l| !l.can_advance_to(next)) {
            return Err(PfiError::Settlement {
                reason: format!("adapter reported {next} after {last:?}"),
            });
        }
        self.reply(
            exchange,
            MessageData::OrderStatus(OrderStatusData { order_status: next }),
        )
    }

    fn final_close(&self, exchange: &Exchange, status: FulfillmentStatus) -> Result<ProtocolMessage> {
        let success = status == FulfillmentStatus::Success;
        let reason = if success {
            constants::CLOSE_REASON_SUCCESS
        } else {
            constants::CLOSE_REASON_FAILED
        };
        self.reply(
            exchange,
            MessageData::Close(CloseData {
                reason: Some(reason.to_string()),
                success: Some(success),
            }),
        )
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// # Errors
    /// [`PfiError::ExchangeNotFound`] if nothing is stored under `exchange_id`.
    pub async fn get_exchange(&self, exchange_id: ExchangeId) -> Result<Exchange> {
        self.load(exchange_id).await
    }

    /// Every exchange `customer` opened with this PFI, oldest first.
    pub async fn exchanges_for(&self, customer: &Did) -> Result<Vec<Exchange>> {
        let mut out = Vec::new();
        for id in self.store.exchange_ids().await? {
            let exchange = self.load(id).await?;
            if exchange.customer() == customer {
                out.push(exchange);
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Recovery
    // -----------------------------------------------------------------------

    /// Continue an exchange interrupted mid-flight: a missing quote is
    /// priced, unfinished fulfilment is driven to close.
    pub async fn resume(&self, exchange_id: ExchangeId) -> Result<ExchangeState> {
        let state = {
            let _guard = self.locks.lock(exchange_id).await;
            let exchange = self.load(exchange_id).await?;
            if exchange.state() == ExchangeState::AwaitingQuote {
                self.quote_pending(&exchange).await?;
                ExchangeState::Quoted
            } else {
                exchange.state()
            }
        };
        if state.is_fulfilling() {
            return Ok(self.fulfil(exchange_id).await?.state());
        }
        Ok(state)
    }

    /// [`resume`](Self::resume) every stored exchange that still has work
    /// to do. Failures are logged and skipped. Returns how many were resumed.
    pub async fn resume_all(&self) -> Result<usize> {
        let mut resumed = 0;
        for id in self.store.exchange_ids().await? {
            let state = match self.load(id).await {
                Ok(exchange) => exchange.state(),
                Err(e) => {
                    tracing::warn!(pfi = %self.name, exchange_id = %id, error = %e, "unreadable exchange");
                    continue;
                }
            };
            if state != ExchangeState::AwaitingQuote && !state.is_fulfilling() {
                continue;
            }
            match self.resume(id).await {
                Ok(now) => {
                    resumed += 1;
                    tracing::info!(pfi = %self.name, exchange_id = %id, from = %state, to = %now, "exchange resumed");
                }
                Err(e) => {
                    tracing::warn!(pfi = %self.name, exchange_id = %id, error = %e, "resume failed");
                }
            }
        }
        Ok(resumed)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn load(&self, exchange_id: ExchangeId) -> Result<Exchange> {
        Exchange::replay(exchange_id, self.store.list(exchange_id).await?)
    }

    fn check_inbound(&self, message: &ProtocolMessage, expected: MessageKind) -> Result<()> {
        if message.kind() != expected {
            return Err(PfiError::UnexpectedKind {
                expected,
                actual: message.kind(),
            });
        }
        if let Err(e) = message.check_signature() {
            tracing::warn!(
                pfi = %self.name,
                exchange_id = %message.exchange_id(),
                kind = %message.kind(),
                error = %e,
                "discarding message with bad signature"
            );
            return Err(e);
        }
        if message.recipient() != self.did() {
            return Err(PfiError::WrongRecipient {
                expected: self.did().clone(),
                actual: message.recipient().clone(),
            });
        }
        if message.metadata.protocol != self.settings.protocol {
            return Err(PfiError::MalformedMessage {
                reason: format!(
                    "protocol {} not supported, expected {}",
                    message.metadata.protocol, self.settings.protocol
                ),
            });
        }
        Ok(())
    }

    fn check_allowed(&self, customer: &Did) -> Result<()> {
        if self.allowlist.is_empty() || self.allowlist.contains(customer) {
            Ok(())
        } else {
            Err(PfiError::CounterpartyNotAllowed(customer.clone()))
        }
    }

    /// Handle an RFQ whose exchange already exists.
    async fn resubmitted_rfq(
        &self,
        rfq: &ProtocolMessage,
        existing: Vec<ProtocolMessage>,
    ) -> Result<ProtocolMessage> {
        let exchange = Exchange::replay(rfq.exchange_id(), existing)?;
        if exchange.rfq().digest()? != rfq.digest()? {
            return Err(PfiError::ExchangeConflict {
                exchange_id: exchange.id(),
                kind: MessageKind::Rfq,
                reason: "exchange was opened by a different RFQ".to_string(),
            });
        }
        if let Some(quote) = exchange
            .messages()
            .iter()
            .find(|m| m.kind() == MessageKind::Quote)
        {
            tracing::debug!(exchange_id = %exchange.id(), "RFQ resubmitted; returning existing quote");
            return Ok(quote.clone());
        }
        if exchange.is_closed() {
            return Err(PfiError::ExchangeClosed(exchange.id()));
        }
        self.quote_pending(&exchange).await
    }

    /// Price and persist the quote of an exchange whose RFQ is already stored.
    async fn quote_pending(&self, exchange: &Exchange) -> Result<ProtocolMessage> {
        let offering = self.offering(&exchange.rfq_data().offering_id).await?;
        let quote = self.price(exchange, &offering)?;
        exchange.accept(&quote)?;
        self.store.append(&quote).await?;
        tracing::info!(pfi = %self.name, exchange_id = %exchange.id(), "pending RFQ quoted");
        Ok(quote)
    }

    fn price(&self, exchange: &Exchange, offering: &Offering) -> Result<ProtocolMessage> {
        let quote = pricing::build_quote(
            offering,
            exchange.rfq_data().payin.amount,
            Utc::now(),
            self.settings.quote_ttl(),
        )?;
        self.reply(exchange, MessageData::Quote(quote))
    }

    /// A signed message from this PFI to the exchange's customer.
    fn reply(&self, exchange: &Exchange, data: MessageData) -> Result<ProtocolMessage> {
        let mut message = ProtocolMessage::new(
            self.did().clone(),
            exchange.customer().clone(),
            exchange.id(),
            data,
        );
        message.metadata.protocol.clone_from(&self.settings.protocol);
        message.signed(self.identity.as_ref())
    }
}

impl std::fmt::Debug for Pfi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pfi")
            .field("name", &self.name)
            .field("did", self.identity.did())
            .field("allowlist", &self.allowlist.len())
            .finish_non_exhaustive()
    }
}
