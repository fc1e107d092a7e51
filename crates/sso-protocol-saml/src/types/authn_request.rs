//! SAML AuthnRequest types.
//!
//! Authentication request message sent by a service provider to an identity provider.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};

use super::{AuthnContextClass, SamlBinding, SAMLP_NS, SAML_NS};

/// SAML Authentication Request.
///
/// An authentication request message sent from a service provider to an
/// identity provider requesting authentication of a principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    #[serde(default = "default_version")]
    pub version: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the service provider issuing the request.
    ///
    /// Empty when the request carries no issuer.
    #[serde(default)]
    pub issuer: String,

    /// The URL where the response should be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// The URL where the request was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Binding to use for the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_binding: Option<String>,

    /// Requested authentication context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_authn_context: Option<RequestedAuthnContext>,

    /// Whether the IdP must authenticate the user directly.
    #[serde(default)]
    pub force_authn: bool,

    /// Whether the IdP must not interact with the user.
    #[serde(default)]
    pub is_passive: bool,

    /// A human-readable name for the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    /// The document this request was decoded from, byte for byte.
    ///
    /// Kept so the request can be forwarded and its embedded signature
    /// verified exactly as received.
    #[serde(skip)]
    pub source_xml: Option<String>,
}

fn default_version() -> String {
    "2.0".to_string()
}

impl AuthnRequest {
    /// Creates a new authentication request.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            version: "2.0".to_string(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            assertion_consumer_service_url: None,
            destination: None,
            protocol_binding: None,
            requested_authn_context: None,
            force_authn: false,
            is_passive: false,
            provider_name: None,
            source_xml: None,
        }
    }

    /// Creates a new authentication request with a custom ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(issuer)
        }
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the protocol binding for the response.
    #[must_use]
    pub fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = Some(binding.uri().to_string());
        self
    }

    /// Sets the requested authentication context.
    #[must_use]
    pub fn with_authn_context(mut self, context: RequestedAuthnContext) -> Self {
        self.requested_authn_context = Some(context);
        self
    }

    /// Sets force authentication.
    #[must_use]
    pub const fn force_authn(mut self, force: bool) -> Self {
        self.force_authn = force;
        self
    }

    /// Sets passive authentication.
    #[must_use]
    pub const fn is_passive(mut self, passive: bool) -> Self {
        self.is_passive = passive;
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    /// Returns the parsed protocol binding.
    #[must_use]
    pub fn parsed_binding(&self) -> Option<SamlBinding> {
        self.protocol_binding.as_deref().and_then(SamlBinding::from_uri)
    }

    /// Returns the requested authentication context class references in
    /// request order, or an empty slice when none were requested.
    #[must_use]
    pub fn requested_class_refs(&self) -> &[String] {
        self.requested_authn_context
            .as_ref()
            .map(|ctx| ctx.authn_context_class_refs.as_slice())
            .unwrap_or_default()
    }

    /// Renders this request as a SAML 2.0 XML document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<samlp:AuthnRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="{}" Version="{}" IssueInstant="{}""#,
            escape(self.id.as_str()),
            escape(self.version.as_str()),
            self.issue_instant.to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        for (name, value) in [
            ("Destination", &self.destination),
            ("AssertionConsumerServiceURL", &self.assertion_consumer_service_url),
            ("ProtocolBinding", &self.protocol_binding),
            ("ProviderName", &self.provider_name),
        ] {
            if let Some(value) = value {
                xml.push_str(&format!(r#" {name}="{}""#, escape(value.as_str())));
            }
        }
        if self.force_authn {
            xml.push_str(r#" ForceAuthn="true""#);
        }
        if self.is_passive {
            xml.push_str(r#" IsPassive="true""#);
        }
        xml.push('>');

        if !self.issuer.is_empty() {
            xml.push_str(&format!(
                "<saml:Issuer>{}</saml:Issuer>",
                escape(self.issuer.as_str())
            ));
        }

        if let Some(ctx) = &self.requested_authn_context {
            xml.push_str(&format!(
                r#"<samlp:RequestedAuthnContext Comparison="{}">"#,
                ctx.comparison.as_str()
            ));
            for class_ref in &ctx.authn_context_class_refs {
                xml.push_str(&format!(
                    "<saml:AuthnContextClassRef>{}</saml:AuthnContextClassRef>",
                    escape(class_ref.as_str())
                ));
            }
            xml.push_str("</samlp:RequestedAuthnContext>");
        }

        xml.push_str("</samlp:AuthnRequest>");
        xml
    }
}

/// Requested authentication context.
///
/// Specifies the authentication context requirements for the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAuthnContext {
    /// Comparison method for the authentication context.
    #[serde(default)]
    pub comparison: AuthnContextComparison,

    /// Acceptable authentication context class references, in request order.
    #[serde(default)]
    pub authn_context_class_refs: Vec<String>,
}

impl RequestedAuthnContext {
    /// Creates a new requested authentication context.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            comparison: AuthnContextComparison::Exact,
            authn_context_class_refs: Vec::new(),
        }
    }

    /// Creates a context requiring exact match of a class reference.
    #[must_use]
    pub fn exact(class: AuthnContextClass) -> Self {
        Self::new().with_class_ref(class)
    }

    /// Adds a class reference.
    #[must_use]
    pub fn with_class_ref(self, class: AuthnContextClass) -> Self {
        self.with_class_ref_uri(class.uri())
    }

    /// Adds a class reference by URI.
    #[must_use]
    pub fn with_class_ref_uri(mut self, uri: impl Into<String>) -> Self {
        self.authn_context_class_refs.push(uri.into());
        self
    }

    /// Sets the comparison method.
    #[must_use]
    pub const fn with_comparison(mut self, comparison: AuthnContextComparison) -> Self {
        self.comparison = comparison;
        self
    }
}

/// Authentication context comparison methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthnContextComparison {
    /// Exact match required.
    #[default]
    Exact,
    /// Match must be at least as strong.
    Minimum,
    /// Match must be at most as strong.
    Maximum,
    /// Match must be stronger.
    Better,
}

impl AuthnContextComparison {
    /// Returns the string value for this comparison.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Better => "better",
        }
    }

    /// Parses a comparison from its attribute value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "exact" => Some(Self::Exact),
            "minimum" => Some(Self::Minimum),
            "maximum" => Some(Self::Maximum),
            "better" => Some(Self::Better),
            _ => None,
        }
    }
}
