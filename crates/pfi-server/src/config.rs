//! Process configuration, read from the environment after loading `.env`.
//!
//! | Variable                      | Default                      |
//! |-------------------------------|------------------------------|
//! | `ENV`                         | `local`                      |
//! | `LOG_LEVEL`                   | `info`                       |
//! | `LOG_FORMAT`                  | `pretty` (`json` also valid) |
//! | `PFI_HOST`                    | `0.0.0.0`                    |
//! | `PFI_KEYS_DIR`                | `keys`                       |
//! | `PFI_DATA_DIR`                | unset: exchanges in memory   |
//! | `SEC_ALLOWLISTED_DIDS`        | `[]`                         |
//! | `SEC_PIN_PAYMENTS_SECRET_KEY` | unset                        |
//! | `SANCTIONS_SOURCE`            | OFAC SDN CSV URL             |
//! | `SANCTIONS_MIN_SCORE`         | `80`                         |
//! | `SANCTIONS_MATCH_POLICY`      | `either`                     |
//! | `SANCTIONS_REFRESH_SECS`      | `0` (never)                  |
//! | `QUOTE_TTL_SECS`              | `86400`                      |

use std::{fmt, net::IpAddr, path::PathBuf, str::FromStr};

use pfi_types::{
    ComplianceSettings, Did, Environment, ExchangeSettings, MatchPolicy, PfiError,
    PfiInstanceConfig, Result, RosterSourceConfig,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = PfiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(PfiError::Configuration(format!(
                "LOG_FORMAT must be pretty or json, got {other:?}"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct ServerConfig {
    pub env: Environment,
    pub log_level: String,
    pub log_format: LogFormat,
    pub host: IpAddr,
    pub keys_dir: PathBuf,
    /// File-backed exchange logs live here, one subdirectory per PFI.
    pub data_dir: Option<PathBuf>,
    /// Customer DIDs allowed to open exchanges; empty allows everyone.
    pub allowlist: Vec<Did>,
    /// Key for the card-payment add-on. Loaded and carried, never used by the core.
    pub pin_payments_secret_key: Option<String>,
    pub compliance: ComplianceSettings,
    pub exchange: ExchangeSettings,
    pub instances: Vec<PfiInstanceConfig>,
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(PfiError::Configuration(format!(".env: {e}")));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let env = var("ENV").map(|v| v.parse::<Environment>()).transpose()?.unwrap_or_default();
        let log_format = var("LOG_FORMAT")
            .map(|v| v.parse::<LogFormat>())
            .transpose()?
            .unwrap_or_default();
        let host = match var("PFI_HOST") {
            Some(v) => v.trim().parse().map_err(|_| {
                PfiError::Configuration(format!("PFI_HOST must be an IP address, got {v:?}"))
            })?,
            None => IpAddr::from([0, 0, 0, 0]),
        };

        let allowlist = match var("SEC_ALLOWLISTED_DIDS") {
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw)
                .map_err(|e| {
                    PfiError::Configuration(format!("SEC_ALLOWLISTED_DIDS must be a JSON array: {e}"))
                })?
                .into_iter()
                .map(Did::parse)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let defaults = ComplianceSettings::default();
        let compliance = ComplianceSettings {
            min_score: parse_number(&var, "SANCTIONS_MIN_SCORE")?.unwrap_or(defaults.min_score),
            match_policy: var("SANCTIONS_MATCH_POLICY")
                .map(|v| v.parse::<MatchPolicy>())
                .transpose()?
                .unwrap_or(defaults.match_policy),
            roster_source: var("SANCTIONS_SOURCE")
                .map(|v| RosterSourceConfig::parse(&v))
                .unwrap_or(defaults.roster_source),
            refresh_interval_secs: parse_number(&var, "SANCTIONS_REFRESH_SECS")?
                .unwrap_or(defaults.refresh_interval_secs),
        };
        if compliance.min_score > pfi_types::constants::MAX_MATCH_SCORE {
            return Err(PfiError::Configuration(format!(
                "SANCTIONS_MIN_SCORE must be 0..=100, got {}",
                compliance.min_score
            )));
        }

        let exchange_defaults = ExchangeSettings::default();
        let exchange = ExchangeSettings {
            quote_ttl_secs: parse_number(&var, "QUOTE_TTL_SECS")?
                .unwrap_or(exchange_defaults.quote_ttl_secs),
            ..exchange_defaults
        };

        Ok(Self {
            env,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            host,
            keys_dir: var("PFI_KEYS_DIR").map_or_else(|| PathBuf::from("keys"), PathBuf::from),
            data_dir: var("PFI_DATA_DIR").map(PathBuf::from),
            allowlist,
            pin_payments_secret_key: var("SEC_PIN_PAYMENTS_SECRET_KEY"),
            compliance,
            exchange,
            instances: PfiInstanceConfig::demo_roster(),
        })
    }
}

fn parse_number<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    var(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| PfiError::Configuration(format!("{key} must be a number, got {v:?}")))
        })
        .transpose()
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("host", &self.host)
            .field("keys_dir", &self.keys_dir)
            .field("data_dir", &self.data_dir)
            .field("allowlist", &self.allowlist)
            .field(
                "pin_payments_secret_key",
                &self.pin_payments_secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("compliance", &self.compliance)
            .field("exchange", &self.exchange)
            .field("instances", &self.instances.len())
            .finish()
    }
}
