//! Service registry error types.

use thiserror::Error;

/// Result type for service registry operations.
pub type ServiceRegistryResult<T> = Result<T, ServiceRegistryError>;

/// Errors that can occur during service registry operations.
#[derive(Debug, Error)]
pub enum ServiceRegistryError {
    /// The service identifier pattern is not a valid regular expression.
    #[error("invalid service pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why compilation failed.
        reason: String,
    },

    /// A service definition could not be read.
    #[error("I/O error: {0}")]
    Io(String),

    /// A service definition could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("internal registry error: {0}")]
    Internal(String),
}

impl ServiceRegistryError {
    /// Creates an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for ServiceRegistryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceRegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
