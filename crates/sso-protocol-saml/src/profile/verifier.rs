//! Inbound request verification.

use std::sync::Arc;

use sso_services::{SamlRegisteredService, ServiceDirectory};

use super::resolve::{resolve_facade, resolve_service};
use super::signature::verify_request_signature;
use crate::codec::{MessageCodec, MessageContext, RawProtocolMessage};
use crate::error::SamlResult;
use crate::metadata::{MetadataLookup, MetadataResolver, ServiceMetadataFacade};
use crate::signature::SignatureEngine;
use crate::types::AuthnRequest;

/// A request that passed verification, with what it was verified against.
#[derive(Debug, Clone)]
pub struct VerifiedRequest {
    /// The decoded request.
    pub request: AuthnRequest,
    /// Transport context of the request.
    pub context: MessageContext,
    /// The registered service provider.
    pub service: SamlRegisteredService,
    /// The service provider's metadata.
    pub facade: ServiceMetadataFacade,
}

/// Verifies inbound authentication requests.
///
/// Verification decodes the message, resolves the issuer in the service
/// registry, resolves its metadata and enforces the signing policy. Each
/// step short-circuits; nothing is retried.
pub struct RequestVerifier {
    directory: Arc<dyn ServiceDirectory>,
    metadata: Arc<dyn MetadataResolver>,
    codec: Arc<dyn MessageCodec>,
    signatures: Arc<dyn SignatureEngine>,
}

impl RequestVerifier {
    /// Creates a verifier over the given collaborators.
    pub fn new(
        directory: Arc<dyn ServiceDirectory>,
        metadata: Arc<dyn MetadataResolver>,
        codec: Arc<dyn MessageCodec>,
        signatures: Arc<dyn SignatureEngine>,
    ) -> Self {
        Self {
            directory,
            metadata,
            codec,
            signatures,
        }
    }

    /// Decodes and verifies an inbound message.
    ///
    /// ## Errors
    ///
    /// - `SamlError::ProtocolDecode` if the message cannot be decoded
    /// - `SamlError::UnauthorizedService` if the issuer is blank, unknown,
    ///   denied, not a SAML service, or has no metadata
    /// - `SamlError::UnsignedRequest` / `SamlError::SignatureInvalid` from
    ///   the signing policy
    pub async fn verify(&self, raw: &RawProtocolMessage) -> SamlResult<VerifiedRequest> {
        let (request, context) = self.codec.decode(raw)?;
        let (service, facade) = self.verify_decoded(&request, &context).await?;
        Ok(VerifiedRequest {
            request,
            context,
            service,
            facade,
        })
    }

    /// Verifies a request that has already been decoded.
    ///
    /// ## Errors
    ///
    /// As [`verify`](Self::verify), except for decoding.
    pub async fn verify_decoded(
        &self,
        request: &AuthnRequest,
        context: &MessageContext,
    ) -> SamlResult<(SamlRegisteredService, ServiceMetadataFacade)> {
        tracing::debug!(
            "Located issuer [{}] from authentication request [{}]",
            request.issuer,
            request.id
        );
        let service = resolve_service(self.directory.as_ref(), &request.issuer).await?;
        let facade = resolve_facade(
            self.metadata.as_ref(),
            &service,
            MetadataLookup::Request(request),
        )
        .await?;
        verify_request_signature(self.signatures.as_ref(), request, context, &facade)?;

        tracing::debug!(
            request_id = %request.id,
            issuer = %request.issuer,
            service = service.id(),
            binding = ?context.binding,
            force_authn = request.force_authn,
            passive = request.is_passive,
            "Verified SAML authentication request"
        );
        Ok((service, facade))
    }

    /// Returns the codec used to decode messages.
    #[must_use]
    pub fn codec(&self) -> &dyn MessageCodec {
        self.codec.as_ref()
    }
}
