//! Tracing subscriber initialisation

use anyhow::Context;
use chronosync_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Builds the filter for `config`; `RUST_LOG` takes precedence when set
pub fn env_filter(config: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {}", config.level)),
    }
}

/// Installs the global fmt subscriber
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
