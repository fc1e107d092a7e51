//! Response assembly after local authentication.

use std::sync::Arc;

use async_trait::async_trait;
use sso_services::{SamlRegisteredService, ServiceDirectory};

use super::resolve::{resolve_facade, resolve_service};
use crate::codec::MessageCodec;
use crate::error::SamlResult;
use crate::metadata::{MetadataLookup, MetadataResolver, ServiceMetadataFacade};
use crate::types::{AuthnRequest, LocalAssertion, SamlBinding};

/// Builds the SAML response for an authenticated request.
#[async_trait]
pub trait ResponseBuilder: Send + Sync {
    /// What the builder produces, typically a rendered response.
    type Output: Send;

    /// Builds the response.
    ///
    /// ## Errors
    ///
    /// Returns `SamlError::ResponseBuild` if the response cannot be built.
    async fn build(
        &self,
        request: &AuthnRequest,
        assertion: &LocalAssertion,
        service: &SamlRegisteredService,
        facade: &ServiceMetadataFacade,
        binding: SamlBinding,
    ) -> SamlResult<Self::Output>;
}

/// Assembles responses once the user has authenticated.
///
/// The service and its metadata are resolved again for every response, so
/// a registry or metadata change made while the user was logging in takes
/// effect.
pub struct ResponseAssembler<B> {
    directory: Arc<dyn ServiceDirectory>,
    metadata: Arc<dyn MetadataResolver>,
    codec: Arc<dyn MessageCodec>,
    builder: B,
}

impl<B: ResponseBuilder> ResponseAssembler<B> {
    /// Creates an assembler.
    pub fn new(
        directory: Arc<dyn ServiceDirectory>,
        metadata: Arc<dyn MetadataResolver>,
        codec: Arc<dyn MessageCodec>,
        builder: B,
    ) -> Self {
        Self {
            directory,
            metadata,
            codec,
            builder,
        }
    }

    /// Decodes the request carried by the callback URL.
    ///
    /// ## Errors
    ///
    /// Returns `SamlError::ProtocolDecode` for a blank or undecodable value.
    pub fn retrieve_request(&self, saml_request: &str) -> SamlResult<AuthnRequest> {
        let request = self.codec.decode_embedded(saml_request)?;
        tracing::debug!(
            "Retrieved authentication request [{}] from [{}]",
            request.id,
            request.issuer
        );
        Ok(request)
    }

    /// Builds the response for `request` on behalf of the authenticated user.
    ///
    /// ## Errors
    ///
    /// Fails like request verification when the issuer no longer resolves,
    /// or with the builder's error.
    pub async fn assemble(
        &self,
        request: &AuthnRequest,
        assertion: &LocalAssertion,
        binding: SamlBinding,
    ) -> SamlResult<B::Output> {
        let service = resolve_service(self.directory.as_ref(), &request.issuer).await?;
        let facade = resolve_facade(
            self.metadata.as_ref(),
            &service,
            MetadataLookup::Request(request),
        )
        .await?;

        assertion.log_details();
        let output = self
            .builder
            .build(request, assertion, &service, &facade, binding)
            .await?;
        tracing::info!(
            "Built SAML response for [{}] to request [{}] using {:?} binding",
            facade.entity_id,
            request.id,
            binding
        );
        Ok(output)
    }

    /// Returns the response builder.
    pub fn builder(&self) -> &B {
        &self.builder
    }
}
