//! Error types for the mock PFIs.
//!
//! All errors use the `PFI_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors (malformed or out-of-order messages, unmet requirements)
//! - 2xx: Compliance errors (screening could not run)
//! - 3xx: Signature errors
//! - 4xx: Dependency errors (storage, catalog, settlement, transport)
//! - 9xx: General / internal errors
//!
//! A sanctions hit is **not** an error: the issuer returns it as a refusal value.

use std::fmt;

use thiserror::Error;

use crate::{Did, ExchangeId, MessageKind, OfferingId};

/// Central error enum for all PFI operations.
#[derive(Debug, Error)]
pub enum PfiError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The message is structurally invalid.
    #[error("PFI_ERR_100: Malformed message: {reason}")]
    MalformedMessage { reason: String },

    /// The RFQ references an offering this PFI does not publish.
    #[error("PFI_ERR_101: Offering not found: {0}")]
    OfferingNotFound(OfferingId),

    /// The RFQ does not satisfy the offering's requirements.
    #[error("PFI_ERR_102: Offering requirements not met: {reason}")]
    OfferingRequirementsNotMet { reason: String },

    /// No exchange exists under this id.
    #[error("PFI_ERR_103: Exchange not found: {0}")]
    ExchangeNotFound(ExchangeId),

    /// The message is redundant or arrives out of order for this exchange.
    #[error("PFI_ERR_104: Exchange {exchange_id} cannot accept {kind}: {reason}")]
    ExchangeConflict {
        exchange_id: ExchangeId,
        kind: MessageKind,
        reason: String,
    },

    /// The exchange is closed; no further messages are accepted.
    #[error("PFI_ERR_105: Exchange already closed: {0}")]
    ExchangeClosed(ExchangeId),

    /// A handler received a message of the wrong kind.
    #[error("PFI_ERR_106: Unexpected message kind: expected {expected}, got {actual}")]
    UnexpectedKind {
        expected: MessageKind,
        actual: MessageKind,
    },

    /// The quote backing an order has expired.
    #[error("PFI_ERR_107: Quote expired for exchange {0}")]
    QuoteExpired(ExchangeId),

    /// The counterparty is not on the allowlist.
    #[error("PFI_ERR_108: Counterparty not allowed: {0}")]
    CounterpartyNotAllowed(Did),

    /// The message is addressed to someone else.
    #[error("PFI_ERR_109: Wrong recipient: expected {expected}, got {actual}")]
    WrongRecipient { expected: Did, actual: Did },

    /// The sender is not one of the two exchange parties.
    #[error("PFI_ERR_110: {did} is not a party to exchange {exchange_id}")]
    NotAParty { did: Did, exchange_id: ExchangeId },

    /// A DID string could not be parsed or resolved.
    #[error("PFI_ERR_111: Invalid DID: {0}")]
    InvalidDid(String),

    // =================================================================
    // Compliance Errors (2xx)
    // =================================================================
    /// The sanctions roster is not loaded; screening fails closed.
    #[error("PFI_ERR_200: Sanctions roster unavailable: {reason}")]
    RosterUnavailable { reason: String },

    // =================================================================
    // Signature Errors (3xx)
    // =================================================================
    /// The signature does not verify against the declared sender.
    #[error("PFI_ERR_300: Signature verification failed: {reason}")]
    SignatureInvalid { reason: String },

    /// The signer's identity is not the declared sender.
    #[error("PFI_ERR_301: Signer {signer} is not authorized to sign for {sender}")]
    SignerMismatch { signer: Did, sender: Did },

    /// The message carries no signature.
    #[error("PFI_ERR_302: Message is not signed")]
    MissingSignature,

    // =================================================================
    // Dependency Errors (4xx)
    // =================================================================
    /// The exchange store failed to read or append.
    #[error("PFI_ERR_400: Storage error: {reason}")]
    Storage { reason: String },

    /// The offering catalog could not be read.
    #[error("PFI_ERR_401: Catalog error: {reason}")]
    Catalog { reason: String },

    /// The settlement adapter failed to advance an order.
    #[error("PFI_ERR_402: Settlement error: {reason}")]
    Settlement { reason: String },

    /// An outbound HTTP call failed.
    #[error("PFI_ERR_403: Transport error: {reason}")]
    Transport { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("PFI_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("PFI_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid environment variable, missing key file, etc.).
    #[error("PFI_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk, network).
    #[error("PFI_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Coarse error class used by transports to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rejected input; exchange state unchanged.
    Validation,
    /// Screening could not be performed.
    Compliance,
    /// Signing or verification failed.
    Signature,
    /// A collaborator is unavailable.
    Dependency,
    /// Bug or misconfiguration.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::Compliance => write!(f, "COMPLIANCE"),
            Self::Signature => write!(f, "SIGNATURE"),
            Self::Dependency => write!(f, "DEPENDENCY"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl PfiError {
    /// The `PFI_ERR_nnn` code of this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedMessage { .. } => "PFI_ERR_100",
            Self::OfferingNotFound(_) => "PFI_ERR_101",
            Self::OfferingRequirementsNotMet { .. } => "PFI_ERR_102",
            Self::ExchangeNotFound(_) => "PFI_ERR_103",
            Self::ExchangeConflict { .. } => "PFI_ERR_104",
            Self::ExchangeClosed(_) => "PFI_ERR_105",
            Self::UnexpectedKind { .. } => "PFI_ERR_106",
            Self::QuoteExpired(_) => "PFI_ERR_107",
            Self::CounterpartyNotAllowed(_) => "PFI_ERR_108",
            Self::WrongRecipient { .. } => "PFI_ERR_109",
            Self::NotAParty { .. } => "PFI_ERR_110",
            Self::InvalidDid(_) => "PFI_ERR_111",
            Self::RosterUnavailable { .. } => "PFI_ERR_200",
            Self::SignatureInvalid { .. } => "PFI_ERR_300",
            Self::SignerMismatch { .. } => "PFI_ERR_301",
            Self::MissingSignature => "PFI_ERR_302",
            Self::Storage { .. } => "PFI_ERR_400",
            Self::Catalog { .. } => "PFI_ERR_401",
            Self::Settlement { .. } => "PFI_ERR_402",
            Self::Transport { .. } => "PFI_ERR_403",
            Self::Internal(_) => "PFI_ERR_900",
            Self::Serialization(_) => "PFI_ERR_901",
            Self::Configuration(_) => "PFI_ERR_902",
            Self::Io(_) => "PFI_ERR_903",
        }
    }

    /// The taxonomy class of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedMessage { .. }
            | Self::OfferingNotFound(_)
            | Self::OfferingRequirementsNotMet { .. }
            | Self::ExchangeNotFound(_)
            | Self::ExchangeConflict { .. }
            | Self::ExchangeClosed(_)
            | Self::UnexpectedKind { .. }
            | Self::QuoteExpired(_)
            | Self::CounterpartyNotAllowed(_)
            | Self::WrongRecipient { .. }
            | Self::NotAParty { .. }
            | Self::InvalidDid(_) => ErrorCategory::Validation,
            Self::RosterUnavailable { .. } => ErrorCategory::Compliance,
            Self::SignatureInvalid { .. } | Self::SignerMismatch { .. } | Self::MissingSignature => {
                ErrorCategory::Signature
            }
            Self::Storage { .. }
            | Self::Catalog { .. }
            | Self::Settlement { .. }
            | Self::Transport { .. } => ErrorCategory::Dependency,
            Self::Internal(_) | Self::Serialization(_) | Self::Configuration(_) | Self::Io(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, PfiError>;

// Conversion from std::io::Error
impl From<std::io::Error> for PfiError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PfiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
