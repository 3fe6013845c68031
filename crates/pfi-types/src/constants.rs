//! System-wide constants for the mock PFIs.

/// Protocol version stamped on every message this workspace produces.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Domain separator prefixed to every message signing payload.
pub const MESSAGE_SIGNING_DOMAIN: &[u8] = b"pfi:message:v1:";

/// Domain separator prefixed to every offering signing payload.
pub const OFFERING_SIGNING_DOMAIN: &[u8] = b"pfi:offering:v1:";

/// Domain separator prefixed to every credential signing payload.
pub const CREDENTIAL_SIGNING_DOMAIN: &[u8] = b"pfi:credential:v1:";

/// DID method prefix. The method-specific id is the hex-encoded ed25519 public key,
/// so a DID resolves to its verifying key without a network round trip.
pub const DID_KEY_PREFIX: &str = "did:key:";

/// Credential type the demo offerings require.
pub const KNOWN_CUSTOMER_CREDENTIAL: &str = "KnownCustomerCredential";

/// Schema reference attached to issued credentials.
pub const CREDENTIAL_SCHEMA_ID: &str = "https://schema.org/PFI";

/// Schema type attached to issued credentials.
pub const CREDENTIAL_SCHEMA_TYPE: &str = "JsonSchema";

/// How long an issued credential stays valid, in days.
pub const CREDENTIAL_VALIDITY_DAYS: i64 = 365;

/// Minimum fuzzy-match score the credential issuer screens with.
pub const ISSUER_MIN_SCORE: u8 = 80;

/// Highest score the fuzzy matcher can produce (exact match).
pub const MAX_MATCH_SCORE: u8 = 100;

/// Default quote time-to-live in seconds (24 hours).
pub const DEFAULT_QUOTE_TTL_SECS: u64 = 86_400;

/// Decimal places a quoted payout amount is rounded to.
pub const PAYOUT_DECIMAL_PLACES: u32 = 2;

/// Default sanctions roster refresh interval in seconds (0 disables refresh).
pub const DEFAULT_ROSTER_REFRESH_SECS: u64 = 0;

/// OFAC Specially Designated Nationals list, the source roster of the demo.
pub const OFAC_SDN_URL: &str = "https://www.treasury.gov/ofac/downloads/sdn.csv";

/// Close reason recorded when fulfilment reaches `SUCCESS`.
pub const CLOSE_REASON_SUCCESS: &str = "SUCCESS";

/// Close reason recorded when fulfilment reaches `FAILED`.
pub const CLOSE_REASON_FAILED: &str = "FAILED";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
