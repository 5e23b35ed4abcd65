//! Structured logging infrastructure for Chronoflux.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.

use crate::config::LoggingConfig;
use crate::error::{CoreError, CoreResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system with structured output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use chronoflux_core::logging;
///
/// logging::init();
/// tracing::info!("Mesh started");
/// ```
pub fn init() {
    warn_on_failure(init_with(&LoggingConfig::default()));
}

/// Initialize the logging system with JSON output for production environments.
///
/// # Example
/// ```no_run
/// use chronoflux_core::logging;
///
/// logging::init_json();
/// tracing::info!(node_id = "alpha", "Node joined");
/// ```
pub fn init_json() {
    warn_on_failure(init_with(&LoggingConfig {
        json: true,
        ..LoggingConfig::default()
    }));
}

/// A second install keeps the existing subscriber, which receives the warning.
fn warn_on_failure(result: CoreResult<()>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "Logging initialization skipped");
    }
}

/// Install a global subscriber from configuration.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a subscriber is
/// already installed or the level directive does not parse.
pub fn init_with(config: &LoggingConfig) -> CoreResult<()> {
    let filter = env_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
    };

    result.map_err(|e| CoreError::Logging(e.to_string()))
}

fn env_filter(default_level: &str) -> CoreResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level).map_err(|e| CoreError::Logging(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_directives() {
        // Only one subscriber can be installed per process, so the filter
        // construction is tested on its own.
        assert!(env_filter("info").is_ok());
        assert!(env_filter("chronoflux_mesh=debug,warn").is_ok());
    }

    #[test]
    fn test_repeated_init_reports_instead_of_panicking() {
        init();
        init_json();
        assert!(matches!(
            init_with(&LoggingConfig::default()),
            Err(CoreError::Logging(_))
        ));
    }
}
