//! SAML error types.
//!
//! Every authorization or signature failure reports the same external error
//! code, so a caller cannot learn whether a service is missing, denied,
//! lacks metadata, or sent a bad signature. The variants stay distinct for
//! logging and tests.

use sso_core::ConfigError;
use sso_services::ServiceRegistryError;
use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// Error code reported for every unauthorized-service failure.
pub const UNAUTHORIZED_SERVICE_CODE: &str = "screen.service.error.message";

/// Error code reported for malformed protocol messages.
pub const PROTOCOL_ERROR_CODE: &str = "screen.protocol.error.message";

/// Error code reported for failures on the identity provider side.
pub const INTERNAL_ERROR_CODE: &str = "screen.internal.error.message";

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// The inbound message is malformed or could not be decoded.
    #[error("protocol decode error: {0}")]
    ProtocolDecode(String),

    /// The issuer is missing, unregistered, denied, not a SAML service, or
    /// has no metadata.
    #[error("unauthorized service: {0}")]
    UnauthorizedService(String),

    /// The service provider requires signed requests but the request is not signed.
    #[error("authentication request from {0} is not signed but should be")]
    UnsignedRequest(String),

    /// The request signature did not verify.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// The service registry failed.
    #[error("service registry error: {0}")]
    Directory(#[from] ServiceRegistryError),

    /// Metadata could not be resolved because the metadata source failed.
    #[error("metadata resolution error: {0}")]
    Metadata(String),

    /// The response builder failed.
    #[error("response building failed: {0}")]
    ResponseBuild(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SamlError {
    /// Creates an unauthorized service error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::UnauthorizedService(message.into())
    }

    /// Returns true for failures that are reported as an unauthorized service.
    #[must_use]
    pub const fn is_authorization_failure(&self) -> bool {
        matches!(
            self,
            Self::UnauthorizedService(_) | Self::UnsignedRequest(_) | Self::SignatureInvalid(_)
        )
    }

    /// Returns the externally visible error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::UnauthorizedService(_) | Self::UnsignedRequest(_) | Self::SignatureInvalid(_) => {
                UNAUTHORIZED_SERVICE_CODE
            }
            Self::ProtocolDecode(_) => PROTOCOL_ERROR_CODE,
            _ => INTERNAL_ERROR_CODE,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::ProtocolDecode(_) => 400,
            Self::UnauthorizedService(_) | Self::UnsignedRequest(_) | Self::SignatureInvalid(_) => {
                403
            }
            _ => 500,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::ProtocolDecode(format!("XML parsing error: {err}"))
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::ProtocolDecode(format!("base64 decode error: {err}"))
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::ProtocolDecode(format!("inflate error: {err}"))
    }
}
