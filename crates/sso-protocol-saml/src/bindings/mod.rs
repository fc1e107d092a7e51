//! SAML bindings implementation.
//!
//! This module implements the SAML 2.0 bindings an authentication request
//! can arrive on:
//!
//! - **HTTP-POST Binding** - Messages are base64-encoded and sent in HTML forms
//! - **HTTP-Redirect Binding** - Messages are deflated, base64-encoded, and URL-encoded
//!
//! # Usage
//!
//! ```rust,ignore
//! use sso_protocol_saml::bindings::HttpRedirectBinding;
//!
//! let url = HttpRedirectBinding::encode_request(&request_xml, "https://idp.example.org/sso", Some("state"))?;
//! let decoded = HttpRedirectBinding::decode_url(&url)?;
//! ```

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

use base64::Engine;

use crate::error::{SamlError, SamlResult};

/// Upper bound on the size of a decoded message.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Decoded SAML binding message.
#[derive(Debug, Clone, Default)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// The RelayState if present.
    pub relay_state: Option<String>,
    /// The detached signature (redirect binding).
    pub signature: Option<String>,
    /// The detached signature algorithm (redirect binding).
    pub sig_alg: Option<String>,
    /// The octets covered by the detached signature (redirect binding).
    pub signed_query: Option<String>,
}

/// Decodes base64 content, ignoring embedded whitespace.
pub(crate) fn decode_base64(encoded: &str) -> SamlResult<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(SamlError::ProtocolDecode("empty SAML message".to_string()));
    }
    if compact.len() > MAX_MESSAGE_SIZE * 4 / 3 + 4 {
        return Err(SamlError::ProtocolDecode(format!(
            "SAML message exceeds {MAX_MESSAGE_SIZE} bytes"
        )));
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

/// Converts decoded bytes into the XML message.
pub(crate) fn into_xml(bytes: Vec<u8>) -> SamlResult<String> {
    String::from_utf8(bytes)
        .map_err(|e| SamlError::ProtocolDecode(format!("Invalid UTF-8 in message: {e}")))
}
