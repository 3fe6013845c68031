//! # pfi-compliance
//!
//! **Compliance plane**: decides whether a party may transact, and issues the
//! known-customer credential that later unlocks offerings.
//!
//! ## Architecture
//!
//! 1. **fuzzy**: deterministic 0..=100 similarity scorer
//! 2. **SanctionsRoster**: process-wide snapshot, swapped atomically on reload
//! 3. **ComplianceGate**: screens a name (and optional country) against the snapshot
//! 4. **CredentialIssuer**: screens, then signs a credential or refuses
//!
//! ## Issuance Flow
//!
//! ```text
//! GET /vc → CredentialIssuer.issue() → ComplianceGate.screen() → RosterSnapshot
//!         → clear:  Credential signed by issuer
//!         → hit:    Refused(SanctionsMatch)
//!         → no roster: Refused(ScreeningUnavailable)   (fail closed)
//! ```

pub mod fuzzy;
pub mod gate;
pub mod issuer;
pub mod roster;

pub use gate::{ComplianceGate, ScreeningHit, screen_snapshot};
pub use issuer::{CredentialIssuer, IssuanceOutcome, RefusalReason};
pub use roster::{
    CsvFileRoster, CsvHttpRoster, RosterSnapshot, RosterSource, SanctionsRoster, StaticRoster,
    parse_roster_csv, source_from_config,
};
