//! Configuration error types.

use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configured URL could not be parsed.
    #[error("invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// The configuration field holding the URL.
        field: &'static str,
        /// Why parsing failed.
        reason: String,
    },

    /// An authentication context mapping is not of the form `source->target`.
    #[error("invalid authentication context mapping: '{0}'")]
    InvalidMapping(String),

    /// A value is present but unusable.
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// The configuration field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl ConfigError {
    /// Creates an invalid URL error.
    #[must_use]
    pub fn invalid_url(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            field,
            reason: reason.into(),
        }
    }
}
