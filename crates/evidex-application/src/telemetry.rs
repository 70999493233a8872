//! Logging setup.

use evidex_core::config::LoggingConfig;
use evidex_core::error::{EvidexError, Result};
use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` when set, otherwise the configured directive.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| EvidexError::config(format!("Invalid log filter '{}': {}", config.filter, e)))
}

/// Installs the global `fmt` subscriber.
///
/// Fails if the filter is invalid or a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| EvidexError::internal(format!("Failed to install tracing subscriber: {}", e)))
}
