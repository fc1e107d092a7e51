//! HTTP-POST Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-POST binding, where the message arrives
//! base64-encoded in an HTML form field.

use crate::error::{SamlError, SamlResult};
use crate::types::parameters;

use super::{decode_base64, into_xml, DecodedMessage};

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Decodes a SAML request from HTTP-POST form data.
    ///
    /// POST messages carry any signature inside the XML document, so no
    /// detached signature is returned.
    pub fn decode(saml_request: Option<&str>, relay_state: Option<&str>) -> SamlResult<DecodedMessage> {
        let encoded = saml_request.ok_or_else(|| {
            SamlError::ProtocolDecode(format!("No {} parameter", parameters::SAML_REQUEST))
        })?;

        let xml = into_xml(decode_base64(encoded)?)?;

        Ok(DecodedMessage {
            xml,
            relay_state: relay_state.map(String::from),
            ..DecodedMessage::default()
        })
    }
}
