//! HTTP-Redirect Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-Redirect binding for sending SAML messages
//! via URL query parameters with DEFLATE compression.

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SamlError, SamlResult};
use crate::types::parameters;

use super::{decode_base64, into_xml, DecodedMessage, MAX_MESSAGE_SIZE};

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes a SAML request for HTTP-Redirect binding.
    ///
    /// Returns a URL with the encoded message in query parameters.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&compressed);

        let separator = if destination.contains('?') { '&' } else { '?' };
        Ok(format!(
            "{destination}{separator}{}",
            signed_query(&encoded, relay_state, None)
        ))
    }

    /// Encodes a signed SAML request for HTTP-Redirect binding.
    ///
    /// `sign` receives the exact octets to sign and returns the base64
    /// signature value.
    pub fn encode_signed_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        sig_alg: &str,
        sign: impl FnOnce(&[u8]) -> SamlResult<String>,
    ) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&compressed);
        let query = signed_query(&encoded, relay_state, Some(sig_alg));
        let signature = sign(query.as_bytes())?;

        let separator = if destination.contains('?') { '&' } else { '?' };
        Ok(format!(
            "{destination}{separator}{query}&{}={}",
            parameters::SIGNATURE,
            urlencoding::encode(&signature)
        ))
    }

    /// Decodes a SAML request from HTTP-Redirect query parameters.
    ///
    /// Parameter values are expected URL-decoded. When a signature algorithm
    /// is present, the signed octets are sliced out of `raw_query`, the query
    /// string as received. Without it they are rebuilt from the values, which
    /// only matches signers that percent-encode the same way.
    pub fn decode(
        saml_request: Option<&str>,
        relay_state: Option<&str>,
        signature: Option<&str>,
        sig_alg: Option<&str>,
        raw_query: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let encoded = saml_request.ok_or_else(|| {
            SamlError::ProtocolDecode(format!("No {} parameter", parameters::SAML_REQUEST))
        })?;

        let compressed = decode_base64(encoded)?;
        let xml = into_xml(deflate_decompress(&compressed)?)?;

        let signed_query = match (sig_alg, raw_query) {
            (None, _) => None,
            (Some(_), Some(query)) => Some(received_signed_octets(query)?),
            (Some(alg), None) => Some(signed_query(encoded, relay_state, Some(alg))),
        };

        Ok(DecodedMessage {
            xml,
            relay_state: relay_state.map(String::from),
            signature: signature.map(String::from),
            sig_alg: sig_alg.map(String::from),
            signed_query,
        })
    }

    /// Decodes a message from a full URL.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SamlError::ProtocolDecode(format!("Invalid URL: {e}")))?;

        let mut saml_request = None;
        let mut relay_state = None;
        let mut signature = None;
        let mut sig_alg = None;

        for (key, value) in parsed.query_pairs() {
            match &*key {
                parameters::SAML_REQUEST => saml_request = Some(value.into_owned()),
                parameters::RELAY_STATE => relay_state = Some(value.into_owned()),
                parameters::SIGNATURE => signature = Some(value.into_owned()),
                parameters::SIG_ALG => sig_alg = Some(value.into_owned()),
                _ => {}
            }
        }

        Self::decode(
            saml_request.as_deref(),
            relay_state.as_deref(),
            signature.as_deref(),
            sig_alg.as_deref(),
            parsed.query(),
        )
    }
}

/// Slices the `SAMLRequest`, `RelayState` and `SigAlg` pairs out of a query
/// string exactly as received and joins them in that order.
fn received_signed_octets(query: &str) -> SamlResult<String> {
    let mut pairs: [Option<&str>; 3] = [None; 3];
    for pair in query.split('&') {
        let key = pair.split_once('=').map_or(pair, |(key, _)| key);
        let slot = match key {
            parameters::SAML_REQUEST => 0,
            parameters::RELAY_STATE => 1,
            parameters::SIG_ALG => 2,
            _ => continue,
        };
        if pairs[slot].replace(pair).is_some() {
            return Err(SamlError::ProtocolDecode(format!("duplicate {key} parameter")));
        }
    }
    Ok(pairs.into_iter().flatten().collect::<Vec<_>>().join("&"))
}

/// Builds the `SAMLRequest=..&RelayState=..&SigAlg=..` octets covered by a
/// detached signature. Absent parameters are left out.
fn signed_query(encoded_request: &str, relay_state: Option<&str>, sig_alg: Option<&str>) -> String {
    let mut parts = vec![format!(
        "{}={}",
        parameters::SAML_REQUEST,
        urlencoding::encode(encoded_request)
    )];
    if let Some(rs) = relay_state {
        parts.push(format!("{}={}", parameters::RELAY_STATE, urlencoding::encode(rs)));
    }
    if let Some(alg) = sig_alg {
        parts.push(format!("{}={}", parameters::SIG_ALG, urlencoding::encode(alg)));
    }
    parts.join("&")
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompresses DEFLATE data, refusing output beyond [`MAX_MESSAGE_SIZE`].
fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decompressed = Vec::new();
    DeflateDecoder::new(data)
        .take(MAX_MESSAGE_SIZE as u64 + 1)
        .read_to_end(&mut decompressed)?;
    if decompressed.len() > MAX_MESSAGE_SIZE {
        return Err(SamlError::ProtocolDecode(format!(
            "inflated SAML message exceeds {MAX_MESSAGE_SIZE} bytes"
        )));
    }
    Ok(decompressed)
}
