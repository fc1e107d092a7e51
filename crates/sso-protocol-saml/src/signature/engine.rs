//! XML signature verification.
//!
//! Detached signatures are verified over the query octets as received.
//! Enveloped signatures are verified over the exclusive canonical forms of
//! the document and of its `SignedInfo`, so the wire form may differ from
//! the signed form in quoting, attribute order, empty-element syntax and
//! namespace placement.

use aws_lc_rs::signature::UnparsedPublicKey;
use base64::Engine;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::codec::{DetachedSignature, MessageContext};
use crate::error::{SamlError, SamlResult};
use crate::metadata::ServiceMetadataFacade;
use crate::types::{transforms, AuthnRequest, XMLDSIG_NS};

use super::c14n::{ExclusiveC14n, Subtree};
use super::{DigestAlgorithm, SignatureAlgorithm, SignatureEngine};

/// Default [`SignatureEngine`] backed by `aws-lc-rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlSignatureEngine {
    /// Whether to allow SHA-1 based signatures (deprecated but sometimes needed).
    allow_sha1: bool,
}

impl XmlSignatureEngine {
    /// Creates an engine that refuses SHA-1.
    #[must_use]
    pub const fn new() -> Self {
        Self { allow_sha1: false }
    }

    /// Allows SHA-1 based signatures (not recommended).
    #[must_use]
    pub const fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    fn check_algorithm(&self, uri: &str) -> SamlResult<SignatureAlgorithm> {
        let algorithm = SignatureAlgorithm::from_uri(uri).ok_or_else(|| {
            SamlError::SignatureInvalid(format!("Unknown signature algorithm: {uri}"))
        })?;
        if algorithm.is_deprecated() && !self.allow_sha1 {
            return Err(SamlError::SignatureInvalid(
                "SHA-1 signatures are not allowed".to_string(),
            ));
        }
        Ok(algorithm)
    }

    /// Verifies a detached HTTP-Redirect signature.
    fn verify_detached(
        &self,
        detached: &DetachedSignature,
        certificates: &[Vec<u8>],
    ) -> SamlResult<bool> {
        let algorithm = self.check_algorithm(&detached.algorithm)?;
        let signature = decode_b64(&detached.value)?;
        verify_with_certificates(
            detached.signed_content.as_bytes(),
            &signature,
            certificates,
            algorithm,
        )
    }

    /// Verifies an enveloped signature on the request document.
    ///
    /// The reference digest covers the exclusive canonical form of the
    /// document without its signature, and the signature value covers the
    /// canonical `SignedInfo`.
    fn verify_enveloped(&self, request: &AuthnRequest, certificates: &[Vec<u8>]) -> SamlResult<bool> {
        let xml = request.source_xml.as_deref().ok_or_else(|| {
            SamlError::SignatureInvalid("request document is not available".to_string())
        })?;
        let signature = EnvelopedSignature::parse(xml)?;

        let algorithm = self.check_algorithm(&signature.signature_method)?;
        let [reference_uri] = signature.references.as_slice() else {
            return Err(SamlError::SignatureInvalid(format!(
                "Signature must carry exactly one Reference, found {}",
                signature.references.len()
            )));
        };
        if reference_uri.strip_prefix('#') != Some(request.id.as_str()) {
            return Err(SamlError::SignatureInvalid(format!(
                "Signature reference {reference_uri} does not cover request {}",
                request.id
            )));
        }

        let digest_algorithm =
            DigestAlgorithm::from_uri(&signature.digest_method).ok_or_else(|| {
                SamlError::SignatureInvalid(format!(
                    "Unknown digest algorithm: {}",
                    signature.digest_method
                ))
            })?;
        if digest_algorithm.is_deprecated() && !self.allow_sha1 {
            return Err(SamlError::SignatureInvalid(
                "SHA-1 digests are not allowed".to_string(),
            ));
        }

        let document = signature
            .reference_canonicalization()?
            .canonicalize(xml, Subtree::Enveloped)?;
        let calculated = digest_algorithm.digest(document.as_bytes());
        if decode_b64(&signature.digest_value)? != calculated {
            tracing::debug!("Digest mismatch for request [{}]", request.id);
            return Ok(false);
        }

        let signed_info = canonicalization(
            &signature.canonicalization,
            signature.canonicalization_prefixes.as_deref(),
        )?
        .canonicalize(xml, Subtree::SignedInfo)?;
        verify_with_certificates(
            signed_info.as_bytes(),
            &decode_b64(&signature.signature_value)?,
            certificates,
            algorithm,
        )
    }
}

impl SignatureEngine for XmlSignatureEngine {
    fn is_signed(&self, context: &MessageContext) -> bool {
        context.detached_signature.is_some() || context.embedded_signature
    }

    fn verify(
        &self,
        request: &AuthnRequest,
        facade: &ServiceMetadataFacade,
        context: &MessageContext,
    ) -> SamlResult<bool> {
        if facade.signing_certificates.is_empty() {
            return Err(SamlError::SignatureInvalid(format!(
                "No signing certificates published for {}",
                facade.entity_id
            )));
        }

        if let Some(detached) = &context.detached_signature {
            return self.verify_detached(detached, &facade.signing_certificates);
        }
        if context.embedded_signature {
            return self.verify_enveloped(request, &facade.signing_certificates);
        }
        Ok(false)
    }
}

/// Tries each certificate in turn; any match verifies the signature.
fn verify_with_certificates(
    data: &[u8],
    signature: &[u8],
    certificates: &[Vec<u8>],
    algorithm: SignatureAlgorithm,
) -> SamlResult<bool> {
    for cert_der in certificates {
        let public_key = extract_public_key_from_cert(cert_der)?;
        let key = UnparsedPublicKey::new(algorithm.verification_algorithm(), &public_key);
        if key.verify(data, signature).is_ok() {
            return Ok(true);
        }
    }
    tracing::debug!(
        "Signature did not verify with any of {} certificate(s)",
        certificates.len()
    );
    Ok(false)
}

/// Extracts the subject public key from an X.509 certificate.
fn extract_public_key_from_cert(cert_der: &[u8]) -> SamlResult<Vec<u8>> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| SamlError::Metadata(format!("Failed to parse certificate: {e}")))?;
    Ok(cert.public_key().subject_public_key.data.to_vec())
}

fn decode_b64(value: &str) -> SamlResult<Vec<u8>> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| SamlError::SignatureInvalid(format!("Invalid base64 value: {e}")))
}

/// Selects exclusive canonicalization for an algorithm URI.
fn canonicalization(algorithm: &str, prefix_list: Option<&str>) -> SamlResult<ExclusiveC14n> {
    let with_comments = match algorithm {
        transforms::EXC_C14N => false,
        transforms::EXC_C14N_WITH_COMMENTS => true,
        other => {
            return Err(SamlError::SignatureInvalid(format!(
                "Unsupported canonicalization algorithm: {other}"
            )))
        }
    };
    Ok(ExclusiveC14n::new(with_comments).with_prefix_list(prefix_list))
}

/// The enveloped signature of a document: the first `ds:Signature` child of
/// the document element.
#[derive(Debug, Default)]
struct EnvelopedSignature {
    canonicalization: String,
    canonicalization_prefixes: Option<String>,
    signature_method: String,
    references: Vec<String>,
    transforms: Vec<String>,
    transform_prefixes: Option<String>,
    digest_method: String,
    digest_value: String,
    signature_value: String,
}

impl EnvelopedSignature {
    fn parse(xml: &str) -> SamlResult<Self> {
        let mut reader = NsReader::from_str(xml);
        let mut signature = Self::default();
        let mut found = false;
        let mut depth = 0usize;
        // Local names from the signature element down to the current element.
        let mut path: Vec<String> = Vec::new();

        loop {
            let (namespace, event) = reader.read_resolved_event()?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let local = std::str::from_utf8(e.local_name().as_ref())
                        .map_err(|e| SamlError::SignatureInvalid(e.to_string()))?
                        .to_string();
                    let opens_signature = depth == 1
                        && !found
                        && local == "Signature"
                        && matches!(namespace, ResolveResult::Bound(ns) if ns.as_ref() == XMLDSIG_NS.as_bytes());
                    if opens_signature {
                        found = true;
                    }
                    let inside = opens_signature || !path.is_empty();
                    if inside {
                        path.push(local);
                        signature.record(&path, e)?;
                    }
                    if matches!(event, Event::Empty(_)) {
                        if inside {
                            path.pop();
                        }
                    } else {
                        depth += 1;
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    path.pop();
                }
                Event::Text(ref e) => {
                    if let Some(field) = signature.text_field(&path) {
                        field.push_str(&e.unescape()?);
                    }
                }
                Event::DocType(_) => {
                    return Err(SamlError::SignatureInvalid(
                        "DOCTYPE declarations are not allowed".to_string(),
                    ))
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !found {
            return Err(SamlError::SignatureInvalid(
                "No Signature element found".to_string(),
            ));
        }
        Ok(signature)
    }

    fn record(&mut self, path: &[String], e: &BytesStart<'_>) -> SamlResult<()> {
        let names: Vec<&str> = path.iter().map(String::as_str).collect();
        match names.as_slice() {
            [_, "SignedInfo", "CanonicalizationMethod"] => {
                self.canonicalization = attribute(e, "Algorithm")?;
            }
            [_, "SignedInfo", "CanonicalizationMethod", "InclusiveNamespaces"] => {
                self.canonicalization_prefixes = Some(attribute(e, "PrefixList")?);
            }
            [_, "SignedInfo", "SignatureMethod"] => {
                self.signature_method = attribute(e, "Algorithm")?;
            }
            [_, "SignedInfo", "Reference"] => self.references.push(attribute(e, "URI")?),
            [_, "SignedInfo", "Reference", "Transforms", "Transform"] => {
                self.transforms.push(attribute(e, "Algorithm")?);
            }
            [_, "SignedInfo", "Reference", "Transforms", "Transform", "InclusiveNamespaces"] => {
                self.transform_prefixes = Some(attribute(e, "PrefixList")?);
            }
            [_, "SignedInfo", "Reference", "DigestMethod"] => {
                self.digest_method = attribute(e, "Algorithm")?;
            }
            _ => {}
        }
        Ok(())
    }

    fn text_field(&mut self, path: &[String]) -> Option<&mut String> {
        match path.last().map(String::as_str) {
            Some("DigestValue") if path.len() == 4 => Some(&mut self.digest_value),
            Some("SignatureValue") if path.len() == 2 => Some(&mut self.signature_value),
            _ => None,
        }
    }

    /// Canonicalization of the referenced document. Only the enveloped
    /// signature transform followed by exclusive canonicalization is
    /// accepted. A same-document reference drops comments whatever the
    /// canonicalization variant.
    fn reference_canonicalization(&self) -> SamlResult<ExclusiveC14n> {
        let mut enveloped = false;
        let mut exclusive = false;
        for transform in &self.transforms {
            match transform.as_str() {
                transforms::ENVELOPED_SIGNATURE => enveloped = true,
                transforms::EXC_C14N | transforms::EXC_C14N_WITH_COMMENTS => exclusive = true,
                other => {
                    return Err(SamlError::SignatureInvalid(format!(
                        "Unsupported reference transform: {other}"
                    )))
                }
            }
        }
        if !enveloped || !exclusive {
            return Err(SamlError::SignatureInvalid(
                "Reference must apply the enveloped signature and exclusive canonicalization transforms"
                    .to_string(),
            ));
        }
        Ok(ExclusiveC14n::new(false).with_prefix_list(self.transform_prefixes.as_deref()))
    }
}

fn attribute(e: &BytesStart<'_>, name: &str) -> SamlResult<String> {
    let attribute = e
        .try_get_attribute(name)
        .map_err(|e| SamlError::SignatureInvalid(format!("Malformed attribute: {e}")))?;
    Ok(match attribute {
        Some(attribute) => attribute.unescape_value()?.into_owned(),
        None => String::new(),
    })
}
