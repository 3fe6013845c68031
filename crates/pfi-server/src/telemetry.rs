//! Tracing subscriber setup.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from `LOG_LEVEL`.

use pfi_types::{PfiError, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Install the global subscriber. Fails if one is already installed.
pub fn init(log_level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| PfiError::Configuration(format!("LOG_LEVEL {log_level:?}: {e}")))?;

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };
    installed.map_err(|e| PfiError::Configuration(format!("tracing subscriber: {e}")))
}
