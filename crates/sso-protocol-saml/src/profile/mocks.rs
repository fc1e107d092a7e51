//! Hand-written collaborators for profile tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sso_services::{
    InMemoryServiceRegistry, RegisteredService, SamlRegisteredService, ServiceDirectory,
    ServiceRegistryError, ServiceRegistryResult,
};

use super::assembler::ResponseBuilder;
use crate::codec::MessageContext;
use crate::error::{SamlError, SamlResult};
use crate::metadata::{
    InMemoryMetadataResolver, MetadataLookup, MetadataResolver, ServiceMetadataFacade,
};
use crate::signature::SignatureEngine;
use crate::types::{AuthnRequest, LocalAssertion, SamlBinding};

pub(crate) const SP_ENTITY_ID: &str = "https://sp.example.org/shibboleth";
pub(crate) const SP_METADATA: &str = "/etc/sso/metadata/sp.xml";

/// Registry that counts lookups and writes.
#[derive(Default)]
pub(crate) struct CountingDirectory {
    pub(crate) inner: InMemoryServiceRegistry,
    lookups: AtomicUsize,
    saves: AtomicUsize,
    reloads: AtomicUsize,
    failing_reloads: AtomicUsize,
}

impl CountingDirectory {
    pub(crate) fn with_services(services: Vec<RegisteredService>) -> Self {
        Self {
            inner: InMemoryServiceRegistry::with_services(services).unwrap(),
            ..Self::default()
        }
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Makes the next `count` reloads fail without publishing anything.
    pub(crate) fn fail_next_reloads(&self, count: usize) {
        self.failing_reloads.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ServiceDirectory for CountingDirectory {
    async fn find_by_identifier(
        &self,
        service_id: &str,
    ) -> ServiceRegistryResult<Option<RegisteredService>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_identifier(service_id).await
    }

    async fn save(&self, service: RegisteredService) -> ServiceRegistryResult<RegisteredService> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(service).await
    }

    async fn reload(&self) -> ServiceRegistryResult<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_reloads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(ServiceRegistryError::Io("definition directory unreadable".to_string()));
        }
        self.inner.reload().await
    }
}

/// Metadata resolver that counts resolutions.
#[derive(Default)]
pub(crate) struct CountingResolver {
    pub(crate) inner: InMemoryMetadataResolver,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataResolver for CountingResolver {
    async fn resolve(
        &self,
        service: &SamlRegisteredService,
        lookup: MetadataLookup<'_>,
    ) -> SamlResult<Option<ServiceMetadataFacade>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(service, lookup).await
    }
}

/// Signature engine with a fixed answer.
pub(crate) struct StubSignatureEngine {
    signed: bool,
    outcome: Result<bool, String>,
    verify_calls: AtomicUsize,
}

impl StubSignatureEngine {
    pub(crate) fn new(signed: bool, outcome: SamlResult<bool>) -> Self {
        Self {
            signed,
            outcome: outcome.map_err(|e| e.to_string()),
            verify_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

impl SignatureEngine for StubSignatureEngine {
    fn is_signed(&self, _context: &MessageContext) -> bool {
        self.signed
    }

    fn verify(
        &self,
        _request: &AuthnRequest,
        _facade: &ServiceMetadataFacade,
        _context: &MessageContext,
    ) -> SamlResult<bool> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(SamlError::Metadata)
    }
}

/// Response builder that records what it was asked to build.
#[derive(Default)]
pub(crate) struct RecordingBuilder {
    calls: AtomicUsize,
}

impl RecordingBuilder {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseBuilder for RecordingBuilder {
    type Output = String;

    async fn build(
        &self,
        request: &AuthnRequest,
        assertion: &LocalAssertion,
        service: &SamlRegisteredService,
        facade: &ServiceMetadataFacade,
        binding: SamlBinding,
    ) -> SamlResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "{}|{}|{}|{}|{:?}",
            request.id,
            assertion.principal,
            service.id(),
            facade.entity_id,
            binding
        ))
    }
}

/// Registry with the test service provider, plus its published metadata.
pub(crate) fn sp_world(facade: ServiceMetadataFacade) -> (Arc<CountingDirectory>, Arc<CountingResolver>) {
    let directory = CountingDirectory::with_services(vec![RegisteredService::saml(
        100,
        "https://sp\\.example\\.org/.*",
        "Example SP",
        SP_METADATA,
    )]);
    let resolver = CountingResolver::default();
    resolver.inner.register(SP_METADATA, facade);
    (Arc::new(directory), Arc::new(resolver))
}
