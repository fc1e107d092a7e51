//! Protocol message decoding and serialization.
//!
//! A [`MessageCodec`] turns the transport parameters of an inbound message
//! into an [`AuthnRequest`] plus the [`MessageContext`] needed to verify it,
//! and serializes a request back into the XML that is forwarded through the
//! login redirect.

mod parser;

use crate::bindings::{decode_base64, into_xml, HttpPostBinding, HttpRedirectBinding};
use crate::error::{SamlError, SamlResult};
use crate::types::{parameters, AuthnRequest, SamlBinding};

pub(crate) use parser::parse_authn_request;

/// Transport parameters of an inbound SAML message.
#[derive(Debug, Clone)]
pub struct RawProtocolMessage {
    /// Binding the message arrived on.
    pub binding: SamlBinding,
    /// `SAMLRequest` parameter.
    pub saml_request: Option<String>,
    /// `RelayState` parameter.
    pub relay_state: Option<String>,
    /// `SigAlg` parameter (HTTP-Redirect binding).
    pub sig_alg: Option<String>,
    /// `Signature` parameter (HTTP-Redirect binding).
    pub signature: Option<String>,
    /// Query string exactly as received (HTTP-Redirect binding). A detached
    /// signature is checked against these octets.
    pub query: Option<String>,
}

impl RawProtocolMessage {
    /// Creates a message received on the HTTP-Redirect binding.
    #[must_use]
    pub fn redirect(saml_request: impl Into<String>) -> Self {
        Self::new(SamlBinding::HttpRedirect, saml_request)
    }

    /// Creates a message received on the HTTP-POST binding.
    #[must_use]
    pub fn post(saml_request: impl Into<String>) -> Self {
        Self::new(SamlBinding::HttpPost, saml_request)
    }

    /// Creates an HTTP-Redirect message from the raw query string of the
    /// request, keeping the query for signature verification.
    #[must_use]
    pub fn from_redirect_query(query: &str) -> Self {
        let mut raw = Self::empty(SamlBinding::HttpRedirect);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*key {
                parameters::SAML_REQUEST => &mut raw.saml_request,
                parameters::RELAY_STATE => &mut raw.relay_state,
                parameters::SIG_ALG => &mut raw.sig_alg,
                parameters::SIGNATURE => &mut raw.signature,
                _ => continue,
            };
            slot.get_or_insert_with(|| value.into_owned());
        }
        raw.query = Some(query.to_string());
        raw
    }

    /// Creates an HTTP-POST message from its form fields.
    #[must_use]
    pub fn from_post_form(saml_request: Option<String>, relay_state: Option<String>) -> Self {
        Self {
            saml_request,
            relay_state,
            ..Self::empty(SamlBinding::HttpPost)
        }
    }

    fn new(binding: SamlBinding, saml_request: impl Into<String>) -> Self {
        Self {
            saml_request: Some(saml_request.into()),
            ..Self::empty(binding)
        }
    }

    const fn empty(binding: SamlBinding) -> Self {
        Self {
            binding,
            saml_request: None,
            relay_state: None,
            sig_alg: None,
            signature: None,
            query: None,
        }
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.relay_state = Some(relay_state.into());
        self
    }

    /// Sets the detached signature parameters.
    #[must_use]
    pub fn with_signature(mut self, sig_alg: impl Into<String>, signature: impl Into<String>) -> Self {
        self.sig_alg = Some(sig_alg.into());
        self.signature = Some(signature.into());
        self
    }
}

/// Detached signature carried in the query string of a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSignature {
    /// Signature algorithm URI.
    pub algorithm: String,
    /// Base64 signature value.
    pub value: String,
    /// The exact octets the signature covers.
    pub signed_content: String,
}

/// Everything about an inbound message that is not the request itself.
#[derive(Debug, Clone)]
pub struct MessageContext {
    /// Binding the message arrived on.
    pub binding: SamlBinding,
    /// Opaque relay state to echo back.
    pub relay_state: Option<String>,
    /// Detached signature (HTTP-Redirect binding).
    pub detached_signature: Option<DetachedSignature>,
    /// Whether the XML document carries an enveloped signature.
    pub embedded_signature: bool,
}

impl MessageContext {
    /// Creates an unsigned context.
    #[must_use]
    pub const fn new(binding: SamlBinding, relay_state: Option<String>) -> Self {
        Self {
            binding,
            relay_state,
            detached_signature: None,
            embedded_signature: false,
        }
    }
}

/// Decoder and serializer for authentication requests.
pub trait MessageCodec: Send + Sync {
    /// Decodes an inbound message.
    ///
    /// ## Errors
    ///
    /// Returns `SamlError::ProtocolDecode` if the message cannot be decoded
    /// or is not an authentication request.
    fn decode(&self, raw: &RawProtocolMessage) -> SamlResult<(AuthnRequest, MessageContext)>;

    /// Decodes a request embedded in a callback URL (base64, not deflated).
    ///
    /// ## Errors
    ///
    /// Returns `SamlError::ProtocolDecode` for a blank or undecodable value.
    fn decode_embedded(&self, encoded: &str) -> SamlResult<AuthnRequest>;

    /// Serializes a request into its XML document.
    fn serialize(&self, request: &AuthnRequest) -> SamlResult<String>;
}

/// Default [`MessageCodec`] for the HTTP-Redirect and HTTP-POST bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlMessageCodec;

impl XmlMessageCodec {
    /// Creates a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MessageCodec for XmlMessageCodec {
    fn decode(&self, raw: &RawProtocolMessage) -> SamlResult<(AuthnRequest, MessageContext)> {
        let decoded = match raw.binding {
            SamlBinding::HttpRedirect => HttpRedirectBinding::decode(
                raw.saml_request.as_deref(),
                raw.relay_state.as_deref(),
                raw.signature.as_deref(),
                raw.sig_alg.as_deref(),
                raw.query.as_deref(),
            )?,
            SamlBinding::HttpPost => {
                HttpPostBinding::decode(raw.saml_request.as_deref(), raw.relay_state.as_deref())?
            }
        };

        let detached_signature = match (decoded.sig_alg, decoded.signature, decoded.signed_query) {
            (Some(algorithm), Some(value), Some(signed_content)) => Some(DetachedSignature {
                algorithm,
                value,
                signed_content,
            }),
            (None, None, _) => None,
            _ => {
                return Err(SamlError::ProtocolDecode(
                    "SigAlg and Signature must be sent together".to_string(),
                ))
            }
        };

        let (request, embedded_signature) = parse_authn_request(&decoded.xml)?;
        tracing::trace!(
            "Decoded AuthnRequest [{}] from {:?} binding",
            request.id,
            raw.binding
        );

        Ok((
            request,
            MessageContext {
                binding: raw.binding,
                relay_state: decoded.relay_state,
                detached_signature,
                embedded_signature,
            },
        ))
    }

    fn decode_embedded(&self, encoded: &str) -> SamlResult<AuthnRequest> {
        if encoded.trim().is_empty() {
            return Err(SamlError::ProtocolDecode(
                "SAMLRequest parameter is blank".to_string(),
            ));
        }
        let xml = into_xml(decode_base64(encoded)?)?;
        let (request, _) = parse_authn_request(&xml)?;
        Ok(request)
    }

    fn serialize(&self, request: &AuthnRequest) -> SamlResult<String> {
        Ok(request
            .source_xml
            .clone()
            .unwrap_or_else(|| request.to_xml()))
    }
}
