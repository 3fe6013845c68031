//! # pfi-exchange
//!
//! **Exchange plane**: everything a PFI does between an inbound RFQ and the
//! final Close.
//!
//! ## Architecture
//!
//! 1. **ExchangeState / Exchange**: legal message order per exchange, replayed from storage
//! 2. **eligibility**: do the RFQ's claims and payment methods satisfy the offering?
//! 3. **pricing**: `payout = round(payin * rate, 2)` and quote expiry
//! 4. **ExchangeStore**: append-only persistence keyed by exchange id
//! 5. **OfferingCatalog**: read-only offering lookup
//! 6. **SettlementAdapter**: produces the fulfilment status sequence
//! 7. **ExchangeLocks**: one async mutex per exchange id
//! 8. **Pfi**: the handler tying it together
//!
//! ## Message Flow
//!
//! ```text
//! RFQ   → verify → lock → eligibility + catalog → append RFQ → sign + append Quote
//! Order → verify → lock → quote not expired     → append Order
//!       → fulfil: [settlement.advance → sign + append OrderStatus]* → append Close
//! ```
//!
//! Every step is durably appended before the next one runs; a restarted
//! process picks up from the last persisted message via [`Pfi::resume_all`].

pub mod catalog;
pub mod eligibility;
pub mod exchange;
pub mod locks;
pub mod pfi;
pub mod pricing;
pub mod settlement;
pub mod state;
pub mod store;

pub use catalog::{InMemoryCatalog, OfferingCatalog};
pub use eligibility::{check_offering_requirements, satisfies, satisfies_at, select_claims};
pub use exchange::Exchange;
pub use locks::{ExchangeGuard, ExchangeLocks};
pub use pfi::Pfi;
pub use pricing::{build_quote, quote_payout};
pub use settlement::{SettlementAdapter, SimulatedSettlement};
pub use state::ExchangeState;
pub use store::{ExchangeStore, FileExchangeStore, InMemoryExchangeStore};
