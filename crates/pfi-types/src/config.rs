//! Configuration types for PFI instances, screening and exchange handling.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{PfiError, constants};

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = PfiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(PfiError::Configuration(format!(
                "ENV must be local, staging or production, got {other:?}"
            ))),
        }
    }
}

/// How name and country scores combine into a hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Hit if the name score **or** the country score clears the threshold.
    #[default]
    Either,
    /// Hit only if the name clears the threshold and, when a country was
    /// supplied, the country does too.
    Both,
}

impl FromStr for MatchPolicy {
    type Err = PfiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "either" | "or" => Ok(Self::Either),
            "both" | "and" => Ok(Self::Both),
            other => Err(PfiError::Configuration(format!(
                "SANCTIONS_MATCH_POLICY must be either or both, got {other:?}"
            ))),
        }
    }
}

/// Where the sanctions roster is loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "location", rename_all = "lowercase")]
pub enum RosterSourceConfig {
    /// CSV downloaded over HTTP(S).
    Url(String),
    /// CSV on local disk.
    File(String),
}

impl RosterSourceConfig {
    /// `http://` and `https://` locations are URLs, anything else a path.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Url(location.to_string())
        } else {
            Self::File(location.to_string())
        }
    }
}

impl Default for RosterSourceConfig {
    fn default() -> Self {
        Self::Url(constants::OFAC_SDN_URL.to_string())
    }
}

/// Sanctions screening settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSettings {
    /// Threshold the credential issuer screens with.
    pub min_score: u8,
    pub match_policy: MatchPolicy,
    pub roster_source: RosterSourceConfig,
    /// Seconds between wholesale roster reloads; 0 disables refresh.
    pub refresh_interval_secs: u64,
}

impl ComplianceSettings {
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            min_score: constants::ISSUER_MIN_SCORE,
            match_policy: MatchPolicy::default(),
            roster_source: RosterSourceConfig::default(),
            refresh_interval_secs: constants::DEFAULT_ROSTER_REFRESH_SECS,
        }
    }
}

/// Exchange handling settings shared by every PFI in a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    /// How long a quote stays valid.
    pub quote_ttl_secs: u64,
    /// Protocol version stamped on outbound messages.
    pub protocol: String,
}

impl ExchangeSettings {
    #[must_use]
    pub fn quote_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.quote_ttl_secs).unwrap_or(i64::MAX / 1000))
    }
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            quote_ttl_secs: constants::DEFAULT_QUOTE_TTL_SECS,
            protocol: constants::PROTOCOL_VERSION.to_string(),
        }
    }
}

/// One named PFI hosted by the server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PfiInstanceConfig {
    pub name: String,
    pub port: u16,
    /// Key file name inside the keys directory.
    pub key_file: String,
    /// Whether this PFI also runs the credential issuer endpoint.
    #[serde(default)]
    pub issuer: bool,
}

impl PfiInstanceConfig {
    #[must_use]
    pub fn new(name: &str, port: u16) -> Self {
        let slug: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Self {
            name: name.to_string(),
            port,
            key_file: format!("{slug}.json"),
            issuer: false,
        }
    }

    #[must_use]
    pub fn as_issuer(mut self) -> Self {
        self.issuer = true;
        self
    }

    /// The five demo PFIs; the last one also issues credentials.
    #[must_use]
    pub fn demo_roster() -> Vec<Self> {
        vec![
            Self::new("AquaFinance Capital", 4000),
            Self::new("SwiftLiquidity Solutions", 5000),
            Self::new("Flowback Financial", 8000),
            Self::new("Vertex Liquid Assets", 8080),
            Self::new("Titanium Trust", 9000).as_issuer(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(" local ".parse::<Environment>().unwrap(), Environment::Local);
        assert!("prod".parse::<Environment>().is_err());
    }

    #[test]
    fn match_policy_aliases() {
        assert_eq!("or".parse::<MatchPolicy>().unwrap(), MatchPolicy::Either);
        assert_eq!("AND".parse::<MatchPolicy>().unwrap(), MatchPolicy::Both);
        assert!("xor".parse::<MatchPolicy>().is_err());
    }

    #[test]
    fn roster_source_detects_urls() {
        assert!(matches!(
            RosterSourceConfig::parse("https://example.org/sdn.csv"),
            RosterSourceConfig::Url(_)
        ));
        assert!(matches!(
            RosterSourceConfig::parse("./data/sdn.csv"),
            RosterSourceConfig::File(_)
        ));
    }

    #[test]
    fn compliance_defaults() {
        let cfg = ComplianceSettings::default();
        assert_eq!(cfg.min_score, 80);
        assert_eq!(cfg.match_policy, MatchPolicy::Either);
        assert!(cfg.refresh_interval().is_none());
    }

    #[test]
    fn exchange_defaults() {
        let cfg = ExchangeSettings::default();
        assert_eq!(cfg.quote_ttl(), chrono::Duration::hours(24));
        assert_eq!(cfg.protocol, "1.0");
    }

    #[test]
    fn demo_roster_has_one_issuer_on_9000() {
        let roster = PfiInstanceConfig::demo_roster();
        assert_eq!(roster.len(), 5);
        let issuers: Vec<_> = roster.iter().filter(|p| p.issuer).collect();
        assert_eq!(issuers.len(), 1);
        assert_eq!(issuers[0].port, 9000);
        assert_eq!(issuers[0].key_file, "titaniumtrust.json");
    }
}
