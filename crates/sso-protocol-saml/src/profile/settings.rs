//! Immutable profile settings.

use sso_core::IdpConfig;

use super::authn_context::AuthnContextMappings;
use crate::error::SamlResult;
use crate::types::ENDPOINT_SSO_CALLBACK;

/// Settings shared read-only by every profile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSettings {
    /// Public URL prefix of the identity provider.
    pub server_prefix: String,
    /// Local login URL.
    pub login_url: String,
    /// Path of the callback endpoint under the server prefix.
    pub callback_path: String,
    /// Requested-to-local authentication context mappings.
    pub authn_context_mappings: AuthnContextMappings,
    /// Query parameter carrying the negotiated authentication context.
    pub authn_context_parameter: String,
}

impl ProfileSettings {
    /// Builds the settings from identity provider configuration.
    ///
    /// ## Errors
    ///
    /// Returns `SamlError::Config` when the configuration does not validate.
    pub fn from_config(config: &IdpConfig) -> SamlResult<Self> {
        config.validate()?;
        Ok(Self {
            server_prefix: config.server_prefix.trim_end_matches('/').to_string(),
            login_url: config.login_url.clone(),
            callback_path: ENDPOINT_SSO_CALLBACK.to_string(),
            authn_context_mappings: AuthnContextMappings::from_entries(
                &config.authn_context_class_mappings,
            )?,
            authn_context_parameter: config.authn_context_request_parameter.clone(),
        })
    }
}
