//! SAML 2.0 constants and URIs.
//!
//! Contains namespace URIs, binding URIs, protocol parameter names and
//! algorithm identifiers used by the identity provider profile.

/// SAML 2.0 assertion namespace URI.
pub const SAML_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace URI.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// XML Digital Signature namespace URI.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Path of the identity provider callback endpoint, relative to the server prefix.
pub const ENDPOINT_SSO_CALLBACK: &str = "/idp/profile/SAML2/Callback";

/// Path of the HTTP-Redirect SSO profile endpoint.
pub const ENDPOINT_SSO_REDIRECT: &str = "/idp/profile/SAML2/Redirect/SSO";

/// Path of the HTTP-POST SSO profile endpoint.
pub const ENDPOINT_SSO_POST: &str = "/idp/profile/SAML2/POST/SSO";

// ============================================================================
// Binding URIs
// ============================================================================

/// SAML binding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlBinding {
    /// HTTP POST binding.
    HttpPost,
    /// HTTP Redirect binding.
    HttpRedirect,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" => Some(Self::HttpPost),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" => Some(Self::HttpRedirect),
            _ => None,
        }
    }
}

// ============================================================================
// Protocol Parameters
// ============================================================================

/// Query and form parameter names.
pub mod parameters {
    /// Encoded SAML request.
    pub const SAML_REQUEST: &str = "SAMLRequest";

    /// Opaque state echoed back to the service provider.
    pub const RELAY_STATE: &str = "RelayState";

    /// Detached signature algorithm (HTTP-Redirect binding).
    pub const SIG_ALG: &str = "SigAlg";

    /// Detached signature value (HTTP-Redirect binding).
    pub const SIGNATURE: &str = "Signature";

    /// Entity id of the requesting service provider on the callback URL.
    pub const ENTITY_ID: &str = "entityId";
}

/// Parameter names understood by the local login endpoint.
pub mod login_parameters {
    /// Where to return after authentication.
    pub const SERVICE: &str = "service";

    /// Force re-authentication.
    pub const RENEW: &str = "renew";

    /// Do not interact with the user.
    pub const GATEWAY: &str = "gateway";
}

// ============================================================================
// Authentication Context Classes
// ============================================================================

/// SAML authentication context class references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthnContextClass {
    /// Unspecified authentication context.
    #[default]
    Unspecified,
    /// Password-based authentication.
    Password,
    /// Password protected transport (TLS + password).
    PasswordProtectedTransport,
    /// X.509 certificate authentication.
    X509,
    /// TLS client authentication.
    TlsClient,
    /// Kerberos authentication.
    Kerberos,
    /// Previous session (SSO).
    PreviousSession,
}

impl AuthnContextClass {
    /// Returns the URI for this authentication context class.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "urn:oasis:names:tc:SAML:2.0:ac:classes:unspecified",
            Self::Password => "urn:oasis:names:tc:SAML:2.0:ac:classes:Password",
            Self::PasswordProtectedTransport => {
                "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport"
            }
            Self::X509 => "urn:oasis:names:tc:SAML:2.0:ac:classes:X509",
            Self::TlsClient => "urn:oasis:names:tc:SAML:2.0:ac:classes:TLSClient",
            Self::Kerberos => "urn:oasis:names:tc:SAML:2.0:ac:classes:Kerberos",
            Self::PreviousSession => "urn:oasis:names:tc:SAML:2.0:ac:classes:PreviousSession",
        }
    }

    /// Parses an authentication context class from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [
            Self::Unspecified,
            Self::Password,
            Self::PasswordProtectedTransport,
            Self::X509,
            Self::TlsClient,
            Self::Kerberos,
            Self::PreviousSession,
        ]
        .into_iter()
        .find(|class| class.uri() == uri)
    }
}

// ============================================================================
// Signature Algorithms
// ============================================================================

/// XML signature algorithms.
pub mod signature_algorithms {
    /// RSA-SHA256 signature algorithm.
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

    /// RSA-SHA384 signature algorithm.
    pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";

    /// RSA-SHA512 signature algorithm.
    pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

    /// ECDSA-SHA256 signature algorithm.
    pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";

    /// ECDSA-SHA384 signature algorithm.
    pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";

    /// ECDSA-SHA512 signature algorithm.
    pub const ECDSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";

    /// Legacy RSA-SHA1 signature algorithm (not recommended).
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
}

/// Digest algorithms.
pub mod digest_algorithms {
    /// SHA-256 digest algorithm.
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

    /// SHA-384 digest algorithm.
    pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";

    /// SHA-512 digest algorithm.
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

    /// Legacy SHA-1 digest algorithm (not recommended).
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
}

/// Canonicalization and reference transform algorithms.
pub mod transforms {
    /// Enveloped signature transform.
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

    /// Exclusive XML canonicalization, comments removed.
    pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

    /// Exclusive XML canonicalization, comments kept.
    pub const EXC_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";
}
