//! Core error types for the adscope pipeline.
//!
//! This module defines the central error type shared by the workspace crates.
//! Each collaborator boundary is represented as a variant so that failures
//! keep their origin when they cross crate boundaries.

use thiserror::Error;

/// Central error type for all adscope operations.
#[derive(Error, Debug)]
pub enum AdscopeError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Match pattern errors (malformed domain or pattern)
    #[error("match pattern error: {0}")]
    Pattern(String),

    /// Content script registration errors
    #[error("registration error: {0}")]
    Registration(String),

    /// Message channel errors (subscription, delivery)
    #[error("messaging error: {0}")]
    Messaging(String),

    /// Survey identity lookup errors
    #[error("identity error: {0}")]
    Identity(String),

    /// Telemetry transport or diagnostic sink errors
    #[error("emission error: {0}")]
    Emission(String),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `AdscopeError`.
pub type Result<T> = std::result::Result<T, AdscopeError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AdscopeError::Registration("invalid match pattern".to_string());
        assert_eq!(err.to_string(), "registration error: invalid match pattern");

        let err = ConfigError::InvalidValue {
            field: "measurement.handler_timeout_secs".to_string(),
            reason: "must be greater than zero".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for measurement.handler_timeout_secs: must be greater than zero"
        );
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::NoConfigDir;
        let err: AdscopeError = config_err.into();
        assert!(matches!(err, AdscopeError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: AdscopeError = io_err.into();
        assert!(matches!(err, AdscopeError::Io(_)));
    }
}
