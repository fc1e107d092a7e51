//! Streaming `AuthnRequest` parser.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};
use crate::types::{AuthnContextComparison, AuthnRequest, RequestedAuthnContext};

/// Maximum length for the request ID attribute.
const MAX_REQUEST_ID_LENGTH: usize = 256;

/// Maximum length for the issuer value.
const MAX_ISSUER_LENGTH: usize = 1024;

#[derive(Debug, Clone, Copy)]
enum Capture {
    Issuer,
    ClassRef,
}

#[derive(Debug, Default)]
struct RequestParser {
    request: Option<AuthnRequest>,
    context: Option<RequestedAuthnContext>,
    embedded_signature: bool,
    capture: Option<Capture>,
    text: String,
    depth: usize,
}

/// Parses an `AuthnRequest` document.
///
/// Returns the request, with `source_xml` set to `xml`, and whether the
/// document carries an enveloped signature. A missing or empty issuer is
/// returned as an empty string; rejecting it is a policy decision made by
/// the caller.
pub(crate) fn parse_authn_request(xml: &str) -> SamlResult<(AuthnRequest, bool)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = RequestParser::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => parser.open(&e, false)?,
            Event::Empty(e) => parser.open(&e, true)?,
            Event::Text(e) => parser.text(&e.unescape()?),
            Event::CData(e) => parser.text(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(_) => parser.close(),
            Event::DocType(_) => {
                return Err(SamlError::ProtocolDecode(
                    "DOCTYPE declarations are not allowed".to_string(),
                ))
            }
            Event::Eof => break,
            _ => {}
        }
    }
    parser.finish(xml)
}

impl RequestParser {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> SamlResult<()> {
        let level = self.depth + 1;
        let local_name = e.local_name();
        let name = std::str::from_utf8(local_name.as_ref())
            .map_err(|err| SamlError::ProtocolDecode(format!("invalid element name: {err}")))?;

        match (level, name) {
            (1, "AuthnRequest") => self.request = Some(read_request_attributes(e)?),
            (1, other) => {
                return Err(SamlError::ProtocolDecode(format!(
                    "expected an AuthnRequest, found {other}"
                )))
            }
            (2, "Issuer") if !empty => self.capture = Some(Capture::Issuer),
            (2, "Signature") => self.embedded_signature = true,
            (2, "RequestedAuthnContext") => {
                let mut context = RequestedAuthnContext::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    if attr.key.as_ref() == b"Comparison" {
                        let value = attr.unescape_value()?;
                        context.comparison = AuthnContextComparison::parse(&value).ok_or_else(
                            || SamlError::ProtocolDecode(format!("unknown comparison {value}")),
                        )?;
                    }
                }
                self.context = Some(context);
            }
            (3, "AuthnContextClassRef") if !empty && self.context.is_some() => {
                self.capture = Some(Capture::ClassRef);
            }
            _ => {}
        }

        if !empty {
            self.depth = level;
        }
        Ok(())
    }

    fn text(&mut self, value: &str) {
        if self.capture.is_some() {
            self.text.push_str(value);
        }
    }

    fn close(&mut self) {
        if let Some(capture) = self.capture.take() {
            let value = std::mem::take(&mut self.text).trim().to_string();
            match capture {
                Capture::Issuer => {
                    if let Some(request) = self.request.as_mut() {
                        request.issuer = value;
                    }
                }
                Capture::ClassRef => {
                    if let Some(context) = self.context.as_mut() {
                        context.authn_context_class_refs.push(value);
                    }
                }
            }
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn finish(self, xml: &str) -> SamlResult<(AuthnRequest, bool)> {
        if self.depth != 0 {
            return Err(SamlError::ProtocolDecode(
                "truncated AuthnRequest document".to_string(),
            ));
        }
        let mut request = self
            .request
            .ok_or_else(|| SamlError::ProtocolDecode("no AuthnRequest element".to_string()))?;

        if request.issuer.len() > MAX_ISSUER_LENGTH {
            return Err(SamlError::ProtocolDecode(format!(
                "Issuer exceeds maximum length of {MAX_ISSUER_LENGTH} characters"
            )));
        }

        request.requested_authn_context = self.context;
        request.source_xml = Some(xml.to_string());
        Ok((request, self.embedded_signature))
    }
}

fn read_request_attributes(e: &BytesStart<'_>) -> SamlResult<AuthnRequest> {
    let mut request = AuthnRequest::with_id(String::new(), String::new());
    let mut issue_instant = None;

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.as_ref() {
            b"ID" => request.id = value,
            b"Version" => request.version = value,
            b"IssueInstant" => issue_instant = Some(value),
            b"Destination" => request.destination = Some(value),
            b"AssertionConsumerServiceURL" => request.assertion_consumer_service_url = Some(value),
            b"ProtocolBinding" => request.protocol_binding = Some(value),
            b"ProviderName" => request.provider_name = Some(value),
            b"ForceAuthn" => request.force_authn = parse_bool(&value)?,
            b"IsPassive" => request.is_passive = parse_bool(&value)?,
            _ => {}
        }
    }

    if request.id.is_empty() {
        return Err(SamlError::ProtocolDecode("Missing ID attribute".to_string()));
    }
    if request.id.len() > MAX_REQUEST_ID_LENGTH {
        return Err(SamlError::ProtocolDecode(format!(
            "ID attribute exceeds maximum length of {MAX_REQUEST_ID_LENGTH} characters"
        )));
    }
    if request.version != "2.0" {
        return Err(SamlError::ProtocolDecode(format!(
            "Unsupported SAML version: {}",
            request.version
        )));
    }

    let issue_instant = issue_instant
        .ok_or_else(|| SamlError::ProtocolDecode("Missing IssueInstant attribute".to_string()))?;
    request.issue_instant = DateTime::parse_from_rfc3339(&issue_instant)
        .map_err(|e| SamlError::ProtocolDecode(format!("Invalid IssueInstant: {e}")))?
        .with_timezone(&Utc);

    Ok(request)
}

fn parse_bool(value: &str) -> SamlResult<bool> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(SamlError::ProtocolDecode(format!(
            "invalid boolean attribute value {other}"
        ))),
    }
}
