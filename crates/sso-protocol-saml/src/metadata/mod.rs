//! Service provider metadata.
//!
//! A [`ServiceMetadataFacade`] is the read-only view of a service provider's
//! published metadata that the profile needs: whether it signs its
//! authentication requests, the certificates it signs with, and where it
//! accepts responses.

use async_trait::async_trait;
use dashmap::DashMap;
use sso_services::SamlRegisteredService;

use crate::error::SamlResult;
use crate::types::{AuthnRequest, SamlBinding};

/// An assertion consumer service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionConsumerService {
    /// Binding the endpoint accepts.
    pub binding: SamlBinding,
    /// Endpoint URL.
    pub location: String,
    /// Whether this is the default endpoint.
    pub is_default: bool,
}

/// Read-only view of a service provider's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMetadataFacade {
    /// Entity ID of the service provider.
    pub entity_id: String,
    /// Whether the service provider signs its authentication requests.
    pub authn_requests_signed: bool,
    /// Signing certificates (DER).
    pub signing_certificates: Vec<Vec<u8>>,
    /// Bindings the service provider supports.
    pub sso_bindings: Vec<SamlBinding>,
    /// Assertion consumer service endpoints.
    pub assertion_consumer_services: Vec<AssertionConsumerService>,
}

impl ServiceMetadataFacade {
    /// Creates a facade for an entity with no signing requirement.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            authn_requests_signed: false,
            signing_certificates: Vec::new(),
            sso_bindings: vec![SamlBinding::HttpPost, SamlBinding::HttpRedirect],
            assertion_consumer_services: Vec::new(),
        }
    }

    /// Sets whether authentication requests must be signed.
    #[must_use]
    pub const fn with_authn_requests_signed(mut self, signed: bool) -> Self {
        self.authn_requests_signed = signed;
        self
    }

    /// Adds a signing certificate (DER).
    #[must_use]
    pub fn with_signing_certificate(mut self, der: Vec<u8>) -> Self {
        self.signing_certificates.push(der);
        self
    }

    /// Adds an assertion consumer service endpoint.
    #[must_use]
    pub fn with_assertion_consumer_service(
        mut self,
        binding: SamlBinding,
        location: impl Into<String>,
    ) -> Self {
        let is_default = self.assertion_consumer_services.is_empty();
        self.assertion_consumer_services.push(AssertionConsumerService {
            binding,
            location: location.into(),
            is_default,
        });
        self
    }

    /// Returns the endpoint for `binding`, preferring the default one.
    #[must_use]
    pub fn assertion_consumer_service(&self, binding: SamlBinding) -> Option<&AssertionConsumerService> {
        let matching = || {
            self.assertion_consumer_services
                .iter()
                .filter(move |acs| acs.binding == binding)
        };
        matching()
            .find(|acs| acs.is_default)
            .or_else(|| matching().next())
    }
}

/// What to look up in a service's metadata.
#[derive(Debug, Clone, Copy)]
pub enum MetadataLookup<'a> {
    /// The entity that issued this request.
    Request(&'a AuthnRequest),
    /// An explicit entity ID.
    EntityId(&'a str),
}

impl MetadataLookup<'_> {
    /// Returns the entity ID being looked up.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Request(request) => &request.issuer,
            Self::EntityId(entity_id) => entity_id,
        }
    }
}

/// Resolver for service provider metadata.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolves the metadata facade for an entity within the metadata a
    /// registered service points at.
    ///
    /// Returns `Ok(None)` when the entity is not described there.
    ///
    /// ## Errors
    ///
    /// Returns `SamlError::Metadata` when the metadata source fails.
    async fn resolve(
        &self,
        service: &SamlRegisteredService,
        lookup: MetadataLookup<'_>,
    ) -> SamlResult<Option<ServiceMetadataFacade>>;
}

/// In-memory [`MetadataResolver`] keyed by metadata location and entity ID.
#[derive(Debug, Default)]
pub struct InMemoryMetadataResolver {
    facades: DashMap<(String, String), ServiceMetadataFacade>,
}

impl InMemoryMetadataResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a facade at a metadata location, replacing any facade for
    /// the same entity there.
    pub fn register(&self, metadata_location: impl Into<String>, facade: ServiceMetadataFacade) {
        let key = (metadata_location.into(), facade.entity_id.clone());
        tracing::debug!("Registered metadata for [{}] at [{}]", key.1, key.0);
        self.facades.insert(key, facade);
    }

    /// Removes a facade.
    pub fn remove(&self, metadata_location: &str, entity_id: &str) -> Option<ServiceMetadataFacade> {
        self.facades
            .remove(&(metadata_location.to_string(), entity_id.to_string()))
            .map(|(_, facade)| facade)
    }

    /// Returns the number of registered facades.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facades.len()
    }

    /// Returns true if no facades are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facades.is_empty()
    }
}

#[async_trait]
impl MetadataResolver for InMemoryMetadataResolver {
    async fn resolve(
        &self,
        service: &SamlRegisteredService,
        lookup: MetadataLookup<'_>,
    ) -> SamlResult<Option<ServiceMetadataFacade>> {
        let key = (
            service.metadata_location.clone(),
            lookup.entity_id().to_string(),
        );
        Ok(self.facades.get(&key).map(|entry| entry.value().clone()))
    }
}
