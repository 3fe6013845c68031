//! # pfi-types
//!
//! Shared types, errors, and configuration for the **mock PFI** workspace.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`ExchangeId`], [`MessageId`], [`OfferingId`], [`CredentialId`]
//! - **Identity**: [`Did`], [`Signer`], [`BearerIdentity`]
//! - **Message model**: [`ProtocolMessage`], [`MessageKind`], [`MessageData`], [`Metadata`]
//! - **Offerings**: [`Offering`], [`PaymentTerms`], [`PresentationDefinition`]
//! - **Credentials**: [`Credential`], [`CredentialClaims`]
//! - **Sanctions**: [`SanctionsEntry`]
//! - **Configuration**: [`Environment`], [`ComplianceSettings`], [`ExchangeSettings`]
//! - **Errors**: [`PfiError`] with `PFI_ERR_` prefix codes
//! - **Constants**: protocol version, default thresholds and validity windows

pub mod config;
pub mod constants;
pub mod credential;
pub mod error;
pub mod identity;
pub mod ids;
pub mod message;
pub mod offering;
pub mod sanctions;

// Re-export all primary types at crate root for ergonomic imports:
//   use pfi_types::{ProtocolMessage, Offering, Credential, ...};

pub use config::*;
pub use credential::*;
pub use error::*;
pub use identity::*;
pub use ids::*;
pub use message::*;
pub use offering::*;
pub use sanctions::*;

// Constants are accessed via `pfi_types::constants::FOO`
// (not re-exported to avoid name collisions).
