//! XML Signature support for SAML.
//!
//! This module verifies signatures on inbound authentication requests, either
//! detached in the query string of an HTTP-Redirect message or enveloped in
//! the XML document.
//!
//! # Signature Algorithms
//!
//! The following signature algorithms are supported:
//! - RSA-SHA256 (recommended)
//! - RSA-SHA384
//! - RSA-SHA512
//! - ECDSA-SHA256
//! - ECDSA-SHA384
//! - ECDSA-SHA512
//!
//! Legacy SHA-1 algorithms are supported for compatibility but not recommended.

mod c14n;
mod engine;

pub use engine::*;

#[cfg(test)]
pub(crate) use engine::tests::{facade_for, TestSigner};

use aws_lc_rs::{digest, signature};

use crate::codec::MessageContext;
use crate::error::SamlResult;
use crate::metadata::ServiceMetadataFacade;
use crate::types::{digest_algorithms, signature_algorithms, AuthnRequest};

/// Signature checks over inbound requests.
pub trait SignatureEngine: Send + Sync {
    /// Returns whether the message carries a signature of any kind.
    fn is_signed(&self, context: &MessageContext) -> bool;

    /// Verifies the message signature against the service provider's
    /// signing certificates.
    ///
    /// Returns `Ok(false)` when the signature does not verify with any
    /// certificate.
    ///
    /// ## Errors
    ///
    /// Returns an error when the signature cannot be checked at all, such
    /// as an unknown algorithm or a malformed signature element.
    fn verify(
        &self,
        request: &AuthnRequest,
        facade: &ServiceMetadataFacade,
        context: &MessageContext,
    ) -> SamlResult<bool>;
}

/// Signature algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// RSA with SHA-256 (recommended).
    #[default]
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    RsaSha512,
    /// ECDSA with SHA-256.
    EcdsaSha256,
    /// ECDSA with SHA-384.
    EcdsaSha384,
    /// ECDSA with SHA-512.
    EcdsaSha512,
    /// Legacy RSA with SHA-1 (not recommended).
    RsaSha1,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => signature_algorithms::RSA_SHA256,
            Self::RsaSha384 => signature_algorithms::RSA_SHA384,
            Self::RsaSha512 => signature_algorithms::RSA_SHA512,
            Self::EcdsaSha256 => signature_algorithms::ECDSA_SHA256,
            Self::EcdsaSha384 => signature_algorithms::ECDSA_SHA384,
            Self::EcdsaSha512 => signature_algorithms::ECDSA_SHA512,
            Self::RsaSha1 => signature_algorithms::RSA_SHA1,
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            signature_algorithms::RSA_SHA256 => Some(Self::RsaSha256),
            signature_algorithms::RSA_SHA384 => Some(Self::RsaSha384),
            signature_algorithms::RSA_SHA512 => Some(Self::RsaSha512),
            signature_algorithms::ECDSA_SHA256 => Some(Self::EcdsaSha256),
            signature_algorithms::ECDSA_SHA384 => Some(Self::EcdsaSha384),
            signature_algorithms::ECDSA_SHA512 => Some(Self::EcdsaSha512),
            signature_algorithms::RSA_SHA1 => Some(Self::RsaSha1),
            _ => None,
        }
    }

    /// Returns true if this algorithm uses a deprecated hash (SHA-1).
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::RsaSha1)
    }

    /// Returns the verification parameters for this algorithm.
    ///
    /// ECDSA signatures use the fixed-width `r || s` encoding of XML-DSig.
    #[must_use]
    pub fn verification_algorithm(&self) -> &'static dyn signature::VerificationAlgorithm {
        match self {
            Self::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
            Self::RsaSha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
            Self::RsaSha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
            Self::EcdsaSha256 => &signature::ECDSA_P256_SHA256_FIXED,
            Self::EcdsaSha384 => &signature::ECDSA_P384_SHA384_FIXED,
            Self::EcdsaSha512 => &signature::ECDSA_P521_SHA512_FIXED,
            Self::RsaSha1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        }
    }
}

/// Digest algorithm of an enveloped signature reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
    /// Legacy SHA-1.
    Sha1,
}

impl DigestAlgorithm {
    /// Parses a digest algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            digest_algorithms::SHA256 => Some(Self::Sha256),
            digest_algorithms::SHA384 => Some(Self::Sha384),
            digest_algorithms::SHA512 => Some(Self::Sha512),
            digest_algorithms::SHA1 => Some(Self::Sha1),
            _ => None,
        }
    }

    /// Returns true for SHA-1.
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::Sha1)
    }

    /// Computes the digest of `data`.
    #[must_use]
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let algorithm = match self {
            Self::Sha256 => &digest::SHA256,
            Self::Sha384 => &digest::SHA384,
            Self::Sha512 => &digest::SHA512,
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
        };
        digest::digest(algorithm, data).as_ref().to_vec()
    }
}
