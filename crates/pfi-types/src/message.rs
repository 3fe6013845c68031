//! # Protocol messages: the five kinds exchanged between customer and PFI
//!
//! Every message is a [`Metadata`] header plus a kind-specific [`MessageData`]
//! payload, sealed by a detached ed25519 signature from the sender.
//!
//! ## Wire Shape
//!
//! ```text
//! {
//!   "metadata":  { "id", "kind", "from", "to", "exchangeId", "protocol", "createdAt" },
//!   "data":      { ...kind-specific... },
//!   "signature": "<hex ed25519 over domain || json([metadata, data])>"
//! }
//! ```
//!
//! The payload is decoded by switching on `metadata.kind`, so the kind tag
//! and the payload variant can never disagree after deserialization.
//!
//! ## Lifecycle Kinds
//!
//! ```text
//!   customer ──RFQ──▶ PFI ──Quote──▶ customer ──Order──▶ PFI
//!                          PFI ──OrderStatus*──▶ customer
//!   either party ──Close──▶ other party
//! ```

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    Credential, Did, ExchangeId, MessageId, OfferingId, PfiError, Result, Signer, constants,
    verify_detached,
};

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// Discriminant of the five protocol message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Rfq,
    Quote,
    Order,
    OrderStatus,
    Close,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rfq => write!(f, "rfq"),
            Self::Quote => write!(f, "quote"),
            Self::Order => write!(f, "order"),
            Self::OrderStatus => write!(f, "orderstatus"),
            Self::Close => write!(f, "close"),
        }
    }
}

// ---------------------------------------------------------------------------
// Kind-specific payloads
// ---------------------------------------------------------------------------

/// Pay-in leg selected by the customer in an RFQ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPayin {
    pub amount: Decimal,
    /// Payment method kind, e.g. `USD_BANK_TRANSFER`.
    pub kind: String,
    #[serde(default)]
    pub payment_details: BTreeMap<String, String>,
}

/// Pay-out leg selected by the customer in an RFQ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPayout {
    pub kind: String,
    #[serde(default)]
    pub payment_details: BTreeMap<String, String>,
}

/// Request for quote: opens an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfqData {
    pub offering_id: OfferingId,
    pub payin: SelectedPayin,
    pub payout: SelectedPayout,
    #[serde(default)]
    pub claims: Vec<Credential>,
}

/// One priced leg of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteAmount {
    pub currency_code: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
}

/// A PFI's signed price for the RFQ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteData {
    pub expires_at: DateTime<Utc>,
    pub payin: QuoteAmount,
    pub payout: QuoteAmount,
}

/// The customer accepts the quote. Carries no data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderData {}

/// Settlement progress label reported in an `OrderStatus` message.
///
/// Progress is **monotonic**: `InProgress → TransferringFunds → Success`,
/// with `Failed` reachable from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStatus {
    InProgress,
    #[serde(alias = "TRANSFERING_FUNDS")]
    TransferringFunds,
    Success,
    Failed,
}

impl FulfillmentStatus {
    /// `Success` and `Failed` end fulfilment.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::InProgress => 0,
            Self::TransferringFunds => 1,
            Self::Success | Self::Failed => 2,
        }
    }

    /// Can fulfilment move from `self` to `next`?
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::TransferringFunds => write!(f, "TRANSFERRING_FUNDS"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Order status update pushed by the PFI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusData {
    pub order_status: FulfillmentStatus,
}

/// Terminal message of an exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// Kind-specific payload. Serialized without a tag; the tag lives in
/// [`Metadata::kind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MessageData {
    Rfq(RfqData),
    Quote(QuoteData),
    Order(OrderData),
    OrderStatus(OrderStatusData),
    Close(CloseData),
}

impl MessageData {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Rfq(_) => MessageKind::Rfq,
            Self::Quote(_) => MessageKind::Quote,
            Self::Order(_) => MessageKind::Order,
            Self::OrderStatus(_) => MessageKind::OrderStatus,
            Self::Close(_) => MessageKind::Close,
        }
    }

    fn decode(kind: MessageKind, data: serde_json::Value) -> Result<Self> {
        Ok(match kind {
            MessageKind::Rfq => Self::Rfq(serde_json::from_value(data)?),
            MessageKind::Quote => Self::Quote(serde_json::from_value(data)?),
            MessageKind::Order => Self::Order(serde_json::from_value(data)?),
            MessageKind::OrderStatus => Self::OrderStatus(serde_json::from_value(data)?),
            MessageKind::Close => Self::Close(serde_json::from_value(data)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Metadata + ProtocolMessage
// ---------------------------------------------------------------------------

/// Header common to every message kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub id: MessageId,
    pub kind: MessageKind,
    pub from: Did,
    pub to: Did,
    pub exchange_id: ExchangeId,
    pub protocol: String,
    pub created_at: DateTime<Utc>,
}

/// Shape accepted off the wire before the payload is decoded by kind.
#[derive(Deserialize)]
struct WireMessage {
    metadata: Metadata,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    signature: Option<String>,
}

/// A signed protocol message of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage")]
pub struct ProtocolMessage {
    pub metadata: Metadata,
    pub data: MessageData,
    /// Hex-encoded ed25519 signature by `metadata.from`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl TryFrom<WireMessage> for ProtocolMessage {
    type Error = PfiError;

    fn try_from(wire: WireMessage) -> Result<Self> {
        let data = MessageData::decode(wire.metadata.kind, wire.data).map_err(|e| {
            PfiError::MalformedMessage {
                reason: format!("{} data: {e}", wire.metadata.kind),
            }
        })?;
        Ok(Self {
            metadata: wire.metadata,
            data,
            signature: wire.signature,
        })
    }
}

impl ProtocolMessage {
    /// Build an unsigned message in an existing exchange.
    #[must_use]
    pub fn new(from: Did, to: Did, exchange_id: ExchangeId, data: MessageData) -> Self {
        Self {
            metadata: Metadata {
                id: MessageId::new(),
                kind: data.kind(),
                from,
                to,
                exchange_id,
                protocol: constants::PROTOCOL_VERSION.to_string(),
                created_at: Utc::now(),
            },
            data,
            signature: None,
        }
    }

    /// Build an unsigned RFQ opening a fresh exchange.
    #[must_use]
    pub fn rfq(from: Did, to: Did, data: RfqData) -> Self {
        Self::new(from, to, ExchangeId::new(), MessageData::Rfq(data))
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.data.kind()
    }

    #[must_use]
    pub fn id(&self) -> MessageId {
        self.metadata.id
    }

    #[must_use]
    pub fn exchange_id(&self) -> ExchangeId {
        self.metadata.exchange_id
    }

    #[must_use]
    pub fn sender(&self) -> &Did {
        &self.metadata.from
    }

    #[must_use]
    pub fn recipient(&self) -> &Did {
        &self.metadata.to
    }

    #[must_use]
    pub fn as_rfq(&self) -> Option<&RfqData> {
        match &self.data {
            MessageData::Rfq(rfq) => Some(rfq),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_quote(&self) -> Option<&QuoteData> {
        match &self.data {
            MessageData::Quote(quote) => Some(quote),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_order_status(&self) -> Option<FulfillmentStatus> {
        match &self.data {
            MessageData::OrderStatus(status) => Some(status.order_status),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_close(&self) -> Option<&CloseData> {
        match &self.data {
            MessageData::Close(close) => Some(close),
            _ => None,
        }
    }

    /// Canonical signing payload.
    ///
    /// Format: `"pfi:message:v1:" || json([metadata, data])`
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let mut payload = constants::MESSAGE_SIGNING_DOMAIN.to_vec();
        serde_json::to_writer(&mut payload, &(&self.metadata, &self.data))?;
        Ok(payload)
    }

    /// Hex SHA-256 of the signing payload. Two messages with equal digests
    /// carry the same header and body.
    pub fn digest(&self) -> Result<String> {
        Ok(hex::encode(Sha256::digest(self.signing_payload()?)))
    }

    /// Attach a detached signature from `signer`.
    ///
    /// # Errors
    /// Returns [`PfiError::SignerMismatch`] if `signer` is not the declared sender.
    pub fn sign(&mut self, signer: &dyn Signer) -> Result<()> {
        if signer.did() != &self.metadata.from {
            return Err(PfiError::SignerMismatch {
                signer: signer.did().clone(),
                sender: self.metadata.from.clone(),
            });
        }
        let payload = self.signing_payload()?;
        self.signature = Some(signer.sign(&payload)?);
        Ok(())
    }

    /// Builder-style [`sign`](Self::sign).
    pub fn signed(mut self, signer: &dyn Signer) -> Result<Self> {
        self.sign(signer)?;
        Ok(self)
    }

    /// Returns `true` if the signature verifies against the declared sender
    /// and the header kind matches the payload. Never errors.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.check_signature().is_ok()
    }

    /// Like [`verify`](Self::verify) but says why verification failed.
    pub fn check_signature(&self) -> Result<()> {
        let signature = self.signature.as_ref().ok_or(PfiError::MissingSignature)?;
        if self.metadata.kind != self.data.kind() {
            return Err(PfiError::SignatureInvalid {
                reason: format!(
                    "header kind {} does not match {} payload",
                    self.metadata.kind,
                    self.data.kind()
                ),
            });
        }
        let payload = self.signing_payload()?;
        if verify_detached(&self.metadata.from, &payload, signature) {
            Ok(())
        } else {
            Err(PfiError::SignatureInvalid {
                reason: format!(
                    "{} {} not signed by {}",
                    self.kind(),
                    self.metadata.id,
                    self.metadata.from
                ),
            })
        }
    }
}
