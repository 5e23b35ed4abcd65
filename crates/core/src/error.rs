//! Core error types

use thiserror::Error;

/// Core error type for Chronoflux
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration value out of range or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
