//! Common test utilities and fixtures.

use std::sync::Arc;

use async_trait::async_trait;
use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::STANDARD, Engine};
use sso_core::IdpConfig;
use sso_protocol_saml::bindings::HttpRedirectBinding;
use sso_protocol_saml::codec::RawProtocolMessage;
use sso_protocol_saml::metadata::{InMemoryMetadataResolver, ServiceMetadataFacade};
use sso_protocol_saml::profile::{
    ProfileCollaborators, ProfileSettings, ResponseBuilder, SamlProfileHandler,
};
use sso_protocol_saml::{
    signature_algorithms, AuthnContextClass, AuthnRequest, LocalAssertion, SamlBinding,
    SamlError, SamlResult, ENDPOINT_SSO_REDIRECT,
};
use sso_services::{InMemoryServiceRegistry, RegisteredService, SamlRegisteredService};

pub const SERVER_NAME: &str = "https://sso.example.org";
pub const LOGIN_URL: &str = "https://sso.example.org/cas/login";
pub const SP_ENTITY_ID: &str = "https://sp.example.org/shibboleth";
pub const SP_METADATA: &str = "https://sp.example.org/metadata.xml";
pub const SP_ACS: &str = "https://sp.example.org/Shibboleth.sso/SAML2/POST";
pub const SP_SERVICE_ID: i64 = 1001;

/// Initializes tracing once for the test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sso_protocol_saml=debug,sso_services=debug")
        .with_test_writer()
        .try_init();
}

/// Service provider signing key and its self-signed certificate.
pub struct TestSigner {
    pub certificate: Vec<u8>,
    key: EcdsaKeyPair,
}

impl TestSigner {
    pub fn generate() -> anyhow::Result<Self> {
        let key_pair = rcgen::KeyPair::generate()?;
        let params = rcgen::CertificateParams::new(vec!["sp.example.org".to_string()])?;
        let certificate = params.self_signed(&key_pair)?.der().to_vec();
        let key = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &key_pair.serialize_der())
            .map_err(|e| anyhow::anyhow!("invalid test key: {e}"))?;
        Ok(Self { certificate, key })
    }

    pub fn sign(&self, data: &[u8]) -> SamlResult<String> {
        let signature = self
            .key
            .sign(&SystemRandom::new(), data)
            .map_err(|_| SamlError::Internal("signing failed".to_string()))?;
        Ok(STANDARD.encode(signature.as_ref()))
    }
}

/// What the test response builder produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedResponse {
    pub request_id: String,
    pub principal: String,
    pub service_id: i64,
    pub destination: String,
    pub binding: SamlBinding,
}

impl IntoResponse for IssuedResponse {
    fn into_response(self) -> Response {
        format!("{} {} {}", self.request_id, self.principal, self.destination).into_response()
    }
}

/// Response builder that resolves the assertion consumer service.
pub struct AcsResponseBuilder;

#[async_trait]
impl ResponseBuilder for AcsResponseBuilder {
    type Output = IssuedResponse;

    async fn build(
        &self,
        request: &AuthnRequest,
        assertion: &LocalAssertion,
        service: &SamlRegisteredService,
        facade: &ServiceMetadataFacade,
        binding: SamlBinding,
    ) -> SamlResult<IssuedResponse> {
        let destination = request
            .assertion_consumer_service_url
            .clone()
            .or_else(|| {
                facade
                    .assertion_consumer_service(binding)
                    .map(|acs| acs.location.clone())
            })
            .ok_or_else(|| {
                SamlError::ResponseBuild(format!(
                    "no assertion consumer service for {}",
                    facade.entity_id
                ))
            })?;

        Ok(IssuedResponse {
            request_id: request.id.clone(),
            principal: assertion.principal.clone(),
            service_id: service.id(),
            destination,
            binding,
        })
    }
}

/// An identity provider with one registered service provider.
pub struct TestIdp {
    pub registry: Arc<InMemoryServiceRegistry>,
    pub metadata: Arc<InMemoryMetadataResolver>,
    pub handler: Arc<SamlProfileHandler<AcsResponseBuilder>>,
    pub signer: TestSigner,
}

impl TestIdp {
    /// Creates the identity provider; `require_signed` is the service
    /// provider's `AuthnRequestsSigned` metadata flag.
    pub async fn new(require_signed: bool) -> anyhow::Result<Self> {
        init_tracing();

        let signer = TestSigner::generate()?;
        let registry = Arc::new(InMemoryServiceRegistry::with_services([
            RegisteredService::saml(
                SP_SERVICE_ID,
                "https://sp\\.example\\.org/.*",
                "Example SP",
                SP_METADATA,
            ),
        ])?);

        let metadata = Arc::new(InMemoryMetadataResolver::new());
        metadata.register(
            SP_METADATA,
            ServiceMetadataFacade::new(SP_ENTITY_ID)
                .with_authn_requests_signed(require_signed)
                .with_signing_certificate(signer.certificate.clone())
                .with_assertion_consumer_service(SamlBinding::HttpPost, SP_ACS),
        );

        let handler = Self::handler_for(&registry, &metadata).await?;
        Ok(Self {
            registry,
            metadata,
            handler: Arc::new(handler),
            signer,
        })
    }

    /// Builds another profile handler over the same registry and metadata.
    pub async fn handler_for(
        registry: &Arc<InMemoryServiceRegistry>,
        metadata: &Arc<InMemoryMetadataResolver>,
    ) -> anyhow::Result<SamlProfileHandler<AcsResponseBuilder>> {
        let mut config = IdpConfig::for_server(SERVER_NAME);
        config.authn_context_class_mappings = vec![
            format!("{}->mfa-duo", AuthnContextClass::X509.uri()),
            format!("{}->mfa-u2f", AuthnContextClass::TlsClient.uri()),
        ];
        let settings = ProfileSettings::from_config(&config)?;

        let collaborators = ProfileCollaborators::with_defaults(
            Arc::clone(registry) as _,
            Arc::clone(metadata) as _,
        );
        Ok(SamlProfileHandler::initialize(settings, collaborators, AcsResponseBuilder).await?)
    }

    /// Encodes a request for the HTTP-Redirect binding, optionally signed,
    /// and returns the query string.
    pub fn redirect_query(
        &self,
        request: &AuthnRequest,
        relay_state: Option<&str>,
        signed: bool,
    ) -> anyhow::Result<String> {
        let destination = format!("{SERVER_NAME}/cas{ENDPOINT_SSO_REDIRECT}");
        let xml = request.to_xml();
        let url = if signed {
            HttpRedirectBinding::encode_signed_request(
                &xml,
                &destination,
                relay_state,
                signature_algorithms::ECDSA_SHA256,
                |octets| self.signer.sign(octets),
            )?
        } else {
            HttpRedirectBinding::encode_request(&xml, &destination, relay_state)?
        };
        Ok(url::Url::parse(&url)?.query().unwrap_or_default().to_string())
    }

    /// Encodes a request as the transport parameters of the HTTP-Redirect
    /// binding.
    pub fn redirect_message(
        &self,
        request: &AuthnRequest,
        relay_state: Option<&str>,
        signed: bool,
    ) -> anyhow::Result<RawProtocolMessage> {
        let query = self.redirect_query(request, relay_state, signed)?;
        Ok(RawProtocolMessage::from_redirect_query(&query))
    }
}

/// A request from the registered service provider.
pub fn sp_request(id: &str) -> AuthnRequest {
    AuthnRequest::with_id(id, SP_ENTITY_ID)
}
