//! # pfi-wallet
//!
//! The customer's side of an exchange.
//!
//! 1. **PfiAllowlist**: which PFIs this wallet lists, and where they live
//! 2. **Wallet**: builds and signs RFQ / Order / Close for one customer identity,
//!    checking offering requirements before anything is sent
//! 3. **PfiClient**: HTTP calls to one PFI, including credential requests to the issuer

pub mod allowlist;
pub mod client;
pub mod wallet;

pub use allowlist::{AllowlistEntry, PfiAllowlist};
pub use client::PfiClient;
pub use wallet::Wallet;
