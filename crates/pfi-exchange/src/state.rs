//! # Exchange state machine
//!
//! ```text
//!            RFQ          Quote         Order        OrderStatus*
//!   (none) ─────▶ AWAITING ─────▶ QUOTED ─────▶ ORDERED ─────────▶ STATUS(s)
//!                  _QUOTE           │              │                  │
//!                    │              │   Close      │      Close       │ Close
//!                    └──────────────┴──────────────┴──────────────────┴──────▶ CLOSED
//! ```
//!
//! Transitions are **monotonic**: fulfilment statuses only move forward
//! (`IN_PROGRESS → TRANSFERRING_FUNDS → SUCCESS`, or `FAILED` from any
//! non-terminal status), and nothing is accepted once `CLOSED`.

use std::fmt;

use pfi_types::{FulfillmentStatus, MessageData, MessageKind};

/// Where an exchange is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeState {
    /// RFQ accepted; the quote has not been persisted yet.
    AwaitingQuote,
    /// Quote persisted; waiting for the customer's order.
    Quoted,
    /// Order persisted; fulfilment has not reported yet.
    Ordered,
    /// Latest fulfilment status.
    Status(FulfillmentStatus),
    /// Terminal. **Immutable.**
    Closed,
}

impl ExchangeState {
    /// State after the first message of an exchange, if that message may open one.
    #[must_use]
    pub fn open(data: &MessageData) -> Option<Self> {
        matches!(data, MessageData::Rfq(_)).then_some(Self::AwaitingQuote)
    }

    /// State after accepting `data`, or `None` if `data` is out of order here.
    #[must_use]
    pub fn next(self, data: &MessageData) -> Option<Self> {
        match (self, data) {
            (Self::AwaitingQuote, MessageData::Quote(_)) => Some(Self::Quoted),
            (Self::Quoted, MessageData::Order(_)) => Some(Self::Ordered),
            (Self::Ordered, MessageData::OrderStatus(s)) => Some(Self::Status(s.order_status)),
            (Self::Status(last), MessageData::OrderStatus(s))
                if last.can_advance_to(s.order_status) =>
            {
                Some(Self::Status(s.order_status))
            }
            (Self::Closed, _) => None,
            (_, MessageData::Close(_)) => Some(Self::Closed),
            _ => None,
        }
    }

    /// Message kinds accepted in this state.
    #[must_use]
    pub fn expected(self) -> &'static [MessageKind] {
        match self {
            Self::AwaitingQuote => &[MessageKind::Quote, MessageKind::Close],
            Self::Quoted => &[MessageKind::Order, MessageKind::Close],
            Self::Ordered => &[MessageKind::OrderStatus, MessageKind::Close],
            Self::Status(s) if s.is_terminal() => &[MessageKind::Close],
            Self::Status(_) => &[MessageKind::OrderStatus, MessageKind::Close],
            Self::Closed => &[],
        }
    }

    #[must_use]
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }

    /// Does fulfilment still have work to do (more statuses or the final close)?
    #[must_use]
    pub fn is_fulfilling(self) -> bool {
        matches!(self, Self::Ordered | Self::Status(_))
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingQuote => write!(f, "awaiting_quote"),
            Self::Quoted => write!(f, "quoted"),
            Self::Ordered => write!(f, "ordered"),
            Self::Status(s) => write!(f, "status:{}", s.to_string().to_lowercase()),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use pfi_types::{
        CloseData, OfferingId, OrderData, OrderStatusData, QuoteAmount, QuoteData, RfqData,
        SelectedPayin, SelectedPayout,
    };
    use rust_decimal::Decimal;

    use super::*;
    use pfi_types::FulfillmentStatus::{Failed, InProgress, Success, TransferringFunds};

    fn rfq() -> MessageData {
        MessageData::Rfq(RfqData {
            offering_id: OfferingId::new("o"),
            payin: SelectedPayin {
                amount: Decimal::ONE,
                kind: "A".into(),
                payment_details: BTreeMap::new(),
            },
            payout: SelectedPayout {
                kind: "B".into(),
                payment_details: BTreeMap::new(),
            },
            claims: Vec::new(),
        })
    }

    fn quote() -> MessageData {
        let leg = QuoteAmount {
            currency_code: "USD".into(),
            amount: Decimal::ONE,
            fee: None,
        };
        MessageData::Quote(QuoteData {
            expires_at: Utc::now(),
            payin: leg.clone(),
            payout: leg,
        })
    }

    fn status(s: FulfillmentStatus) -> MessageData {
        MessageData::OrderStatus(OrderStatusData { order_status: s })
    }

    fn close() -> MessageData {
        MessageData::Close(CloseData::default())
    }

    fn order() -> MessageData {
        MessageData::Order(OrderData {})
    }

    #[test]
    fn only_rfq_opens() {
        assert_eq!(ExchangeState::open(&rfq()), Some(ExchangeState::AwaitingQuote));
        assert_eq!(ExchangeState::open(&order()), None);
        assert_eq!(ExchangeState::open(&close()), None);
    }

    #[test]
    fn happy_path() {
        let mut state = ExchangeState::open(&rfq()).unwrap();
        for (data, expected) in [
            (quote(), ExchangeState::Quoted),
            (order(), ExchangeState::Ordered),
            (status(InProgress), ExchangeState::Status(InProgress)),
            (status(TransferringFunds), ExchangeState::Status(TransferringFunds)),
            (status(Success), ExchangeState::Status(Success)),
            (close(), ExchangeState::Closed),
        ] {
            state = state.next(&data).unwrap();
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn out_of_order_rejected() {
        assert_eq!(ExchangeState::AwaitingQuote.next(&order()), None);
        assert_eq!(ExchangeState::Quoted.next(&quote()), None);
        assert_eq!(ExchangeState::Quoted.next(&status(InProgress)), None);
        assert_eq!(ExchangeState::Ordered.next(&order()), None);
        assert_eq!(ExchangeState::Quoted.next(&rfq()), None);
    }

    #[test]
    fn statuses_never_go_backwards() {
        let state = ExchangeState::Status(TransferringFunds);
        assert_eq!(state.next(&status(InProgress)), None);
        assert_eq!(state.next(&status(TransferringFunds)), None);
        assert_eq!(state.next(&status(Failed)), Some(ExchangeState::Status(Failed)));
        assert_eq!(ExchangeState::Status(Success).next(&status(Failed)), None);
    }

    #[test]
    fn close_from_any_open_state() {
        for state in [
            ExchangeState::AwaitingQuote,
            ExchangeState::Quoted,
            ExchangeState::Ordered,
            ExchangeState::Status(InProgress),
            ExchangeState::Status(Success),
        ] {
            assert_eq!(state.next(&close()), Some(ExchangeState::Closed), "{state}");
        }
    }

    #[test]
    fn closed_is_terminal() {
        for data in [rfq(), quote(), order(), status(InProgress), close()] {
            assert_eq!(ExchangeState::Closed.next(&data), None);
        }
        assert!(ExchangeState::Closed.expected().is_empty());
    }

    #[test]
    fn display_labels() {
        assert_eq!(ExchangeState::AwaitingQuote.to_string(), "awaiting_quote");
        assert_eq!(
            ExchangeState::Status(TransferringFunds).to_string(),
            "status:transferring_funds"
        );
    }
}
