//! # Exchange: the ordered message log of one RFQ-to-close lifecycle
//!
//! An [`Exchange`] is rebuilt from storage by replaying its messages through
//! the [`ExchangeState`] machine. Replay re-checks every invariant, including
//! each message's signature, so a corrupted or hand-edited log is reported
//! instead of trusted.
//!
//! ## Party Rules
//!
//! The RFQ fixes the two parties: its sender is the **customer**, its
//! recipient the **PFI**.
//!
//! | Kind        | From     | To       |
//! |-------------|----------|----------|
//! | RFQ, Order  | customer | PFI      |
//! | Quote, OrderStatus | PFI | customer |
//! | Close       | either   | the other |

use pfi_types::{
    Did, ExchangeId, FulfillmentStatus, MessageKind, PfiError, ProtocolMessage, QuoteData,
    Result, RfqData,
};

use crate::ExchangeState;

/// One exchange: its id, validated message log, and current state.
#[derive(Debug, Clone)]
pub struct Exchange {
    id: ExchangeId,
    rfq: RfqData,
    messages: Vec<ProtocolMessage>,
    state: ExchangeState,
}

/// A stored message, provided its signature still verifies.
fn verified(message: ProtocolMessage) -> Result<ProtocolMessage> {
    message.check_signature().map_err(|e| PfiError::Storage {
        reason: format!(
            "stored {} {} of exchange {} is not trustworthy: {e}",
            message.kind(),
            message.id(),
            message.exchange_id()
        ),
    })?;
    Ok(message)
}

impl Exchange {
    /// Start an exchange from its opening RFQ.
    ///
    /// # Errors
    /// [`PfiError::UnexpectedKind`] if `rfq` is not an RFQ.
    pub fn open(rfq: ProtocolMessage) -> Result<Self> {
        let (Some(state), Some(data)) = (ExchangeState::open(&rfq.data), rfq.as_rfq()) else {
            return Err(PfiError::UnexpectedKind {
                expected: MessageKind::Rfq,
                actual: rfq.kind(),
            });
        };
        Ok(Self {
            id: rfq.exchange_id(),
            rfq: data.clone(),
            messages: vec![rfq],
            state,
        })
    }

    /// Rebuild an exchange from its persisted messages.
    ///
    /// # Errors
    /// [`PfiError::ExchangeNotFound`] for an empty log, [`PfiError::Storage`]
    /// for a message whose signature no longer verifies, otherwise whatever
    /// error the first illegal message would have produced on arrival.
    pub fn replay(id: ExchangeId, messages: Vec<ProtocolMessage>) -> Result<Self> {
        let mut messages = messages.into_iter();
        let first = messages.next().ok_or(PfiError::ExchangeNotFound(id))?;
        if first.exchange_id() != id {
            return Err(PfiError::Storage {
                reason: format!("log for {id} holds message of {}", first.exchange_id()),
            });
        }
        let mut exchange = Self::open(verified(first)?)?;
        for message in messages {
            exchange.push(verified(message)?)?;
        }
        Ok(exchange)
    }

    #[must_use]
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    #[must_use]
    pub fn messages(&self) -> &[ProtocolMessage] {
        &self.messages
    }

    #[must_use]
    pub fn into_messages(self) -> Vec<ProtocolMessage> {
        self.messages
    }

    /// The opening RFQ message.
    #[must_use]
    pub fn rfq(&self) -> &ProtocolMessage {
        &self.messages[0]
    }

    #[must_use]
    pub fn rfq_data(&self) -> &RfqData {
        &self.rfq
    }

    #[must_use]
    pub fn customer(&self) -> &Did {
        self.rfq().sender()
    }

    #[must_use]
    pub fn pfi(&self) -> &Did {
        self.rfq().recipient()
    }

    #[must_use]
    pub fn quote(&self) -> Option<&QuoteData> {
        self.messages.iter().find_map(ProtocolMessage::as_quote)
    }

    /// Latest fulfilment status, if any has been reported.
    #[must_use]
    pub fn latest_status(&self) -> Option<FulfillmentStatus> {
        self.messages
            .iter()
            .rev()
            .find_map(ProtocolMessage::as_order_status)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// Is `did` one of the two parties?
    #[must_use]
    pub fn involves(&self, did: &Did) -> bool {
        did == self.customer() || did == self.pfi()
    }

    /// The state `message` would move this exchange to. Does not mutate.
    ///
    /// # Errors
    /// - [`PfiError::ExchangeClosed`] once closed
    /// - [`PfiError::NotAParty`] / [`PfiError::WrongRecipient`] on party violations
    /// - [`PfiError::ExchangeConflict`] for redundant or out-of-order messages
    pub fn accept(&self, message: &ProtocolMessage) -> Result<ExchangeState> {
        if message.exchange_id() != self.id {
            return Err(PfiError::ExchangeConflict {
                exchange_id: self.id,
                kind: message.kind(),
                reason: format!("message belongs to exchange {}", message.exchange_id()),
            });
        }
        if self.state.is_closed() {
            return Err(PfiError::ExchangeClosed(self.id));
        }
        self.check_parties(message)?;
        self.state
            .next(&message.data)
            .ok_or_else(|| PfiError::ExchangeConflict {
                exchange_id: self.id,
                kind: message.kind(),
                reason: format!(
                    "exchange is {}; expected one of {:?}",
                    self.state,
                    self.state.expected()
                ),
            })
    }

    /// Append `message` after checking it with [`accept`](Self::accept).
    pub fn push(&mut self, message: ProtocolMessage) -> Result<()> {
        self.state = self.accept(&message)?;
        self.messages.push(message);
        Ok(())
    }

    fn check_parties(&self, message: &ProtocolMessage) -> Result<()> {
        let (customer, pfi) = (self.customer(), self.pfi());
        let (from, to) = match message.kind() {
            MessageKind::Rfq | MessageKind::Order => (customer, pfi),
            MessageKind::Quote | MessageKind::OrderStatus => (pfi, customer),
            MessageKind::Close if message.sender() == pfi => (pfi, customer),
            MessageKind::Close => (customer, pfi),
        };
        if message.sender() != from {
            return Err(PfiError::NotAParty {
                did: message.sender().clone(),
                exchange_id: self.id,
            });
        }
        if message.recipient() != to {
            return Err(PfiError::WrongRecipient {
                expected: to.clone(),
                actual: message.recipient().clone(),
            });
        }
        Ok(())
    }
}
