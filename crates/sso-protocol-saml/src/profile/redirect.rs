//! Login redirect and callback URL construction.

use base64::{engine::general_purpose::STANDARD, Engine};
use url::Url;

use super::authn_context::negotiate;
use super::callback::CallbackService;
use super::settings::ProfileSettings;
use crate::codec::{MessageCodec, MessageContext};
use crate::error::{SamlError, SamlResult};
use crate::types::{login_parameters, parameters, AuthnRequest};

/// Builds the callback URL the login sends the user back to.
///
/// The query carries `entityId`, `SAMLRequest` (base64, not deflated) and
/// `RelayState` when present, in that order.
///
/// ## Errors
///
/// Returns `SamlError::Internal` if `callback_url` is not a valid URL.
pub fn build_callback_url(
    callback_url: &str,
    entity_id: &str,
    encoded_request: &str,
    relay_state: Option<&str>,
) -> SamlResult<String> {
    let mut url = Url::parse(callback_url)
        .map_err(|e| SamlError::Internal(format!("invalid callback URL {callback_url}: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair(parameters::ENTITY_ID, entity_id);
        query.append_pair(parameters::SAML_REQUEST, encoded_request);
        if let Some(relay_state) = relay_state {
            query.append_pair(parameters::RELAY_STATE, relay_state);
        }
    }
    Ok(url.into())
}

/// Builds the local login URL for a callback URL.
#[must_use]
pub fn build_login_url(
    login_url: &str,
    service_url: &str,
    force_authn: bool,
    passive: bool,
) -> String {
    let separator = if login_url.contains('?') { '&' } else { '?' };
    let mut url = format!(
        "{login_url}{separator}{}={}",
        login_parameters::SERVICE,
        urlencoding::encode(service_url)
    );
    if force_authn {
        url.push_str(&format!("&{}=true", login_parameters::RENEW));
    }
    if passive {
        url.push_str(&format!("&{}=true", login_parameters::GATEWAY));
    }
    url
}

/// Builds the full login redirect for a verified request.
///
/// ## Errors
///
/// Returns an error if the request cannot be serialized or the callback URL
/// is invalid.
pub fn build_authentication_redirect(
    settings: &ProfileSettings,
    callback: &CallbackService,
    codec: &dyn MessageCodec,
    request: &AuthnRequest,
    context: &MessageContext,
) -> SamlResult<String> {
    let encoded = STANDARD.encode(codec.serialize(request)?);
    let service_url = build_callback_url(
        &callback.url,
        &request.issuer,
        &encoded,
        context.relay_state.as_deref(),
    )?;
    tracing::debug!("Built service callback URL [{}]", service_url);

    let login_url = build_login_url(
        &settings.login_url,
        &service_url,
        request.force_authn,
        request.is_passive,
    );
    let redirect = negotiate(
        &login_url,
        request.requested_class_refs(),
        &settings.authn_context_mappings,
        &settings.authn_context_parameter,
    );
    tracing::debug!("Redirecting SAML authentication request to [{}]", redirect);
    Ok(redirect)
}

/// Query parameters of a callback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParameters {
    /// `entityId` parameter.
    pub entity_id: String,
    /// `SAMLRequest` parameter (base64, not deflated).
    pub saml_request: String,
    /// `RelayState` parameter.
    pub relay_state: Option<String>,
}

impl CallbackParameters {
    /// Reads the parameters of a callback URL.
    ///
    /// ## Errors
    ///
    /// Returns `SamlError::ProtocolDecode` if the URL is invalid or lacks
    /// `entityId` or `SAMLRequest`.
    pub fn from_service_url(service_url: &str) -> SamlResult<Self> {
        let url = Url::parse(service_url)
            .map_err(|e| SamlError::ProtocolDecode(format!("invalid callback URL: {e}")))?;

        let mut entity_id = None;
        let mut saml_request = None;
        let mut relay_state = None;
        for (key, value) in url.query_pairs() {
            match &*key {
                parameters::ENTITY_ID => entity_id = Some(value.into_owned()),
                parameters::SAML_REQUEST => saml_request = Some(value.into_owned()),
                parameters::RELAY_STATE => relay_state = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            entity_id: entity_id.ok_or_else(|| missing(parameters::ENTITY_ID))?,
            saml_request: saml_request.ok_or_else(|| missing(parameters::SAML_REQUEST))?,
            relay_state,
        })
    }

    /// Reads the callback parameters out of a login redirect.
    ///
    /// ## Errors
    ///
    /// As [`from_service_url`](Self::from_service_url), or when the login
    /// URL has no `service` parameter.
    pub fn from_login_url(login_url: &str) -> SamlResult<Self> {
        let url = Url::parse(login_url)
            .map_err(|e| SamlError::ProtocolDecode(format!("invalid login URL: {e}")))?;
        let service = url
            .query_pairs()
            .find(|(key, _)| key == login_parameters::SERVICE)
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| missing(login_parameters::SERVICE))?;
        Self::from_service_url(&service)
    }
}

fn missing(parameter: &str) -> SamlError {
    SamlError::ProtocolDecode(format!("{parameter} parameter required"))
}
