//! Profile composition root.

use std::sync::Arc;

use sso_services::ServiceDirectory;

use super::assembler::{ResponseAssembler, ResponseBuilder};
use super::callback::{CallbackRegistrar, CallbackService};
use super::redirect::build_authentication_redirect;
use super::settings::ProfileSettings;
use super::verifier::RequestVerifier;
use crate::codec::{MessageCodec, MessageContext, RawProtocolMessage, XmlMessageCodec};
use crate::error::SamlResult;
use crate::metadata::MetadataResolver;
use crate::signature::{SignatureEngine, XmlSignatureEngine};
use crate::types::{AuthnRequest, LocalAssertion, SamlBinding};

/// Collaborators the profile is built from.
#[derive(Clone)]
pub struct ProfileCollaborators {
    /// Service registry.
    pub directory: Arc<dyn ServiceDirectory>,
    /// Service provider metadata.
    pub metadata: Arc<dyn MetadataResolver>,
    /// Message codec.
    pub codec: Arc<dyn MessageCodec>,
    /// Signature engine.
    pub signatures: Arc<dyn SignatureEngine>,
}

impl ProfileCollaborators {
    /// Uses the XML codec and signature engine with the given registry and
    /// metadata.
    pub fn with_defaults(
        directory: Arc<dyn ServiceDirectory>,
        metadata: Arc<dyn MetadataResolver>,
    ) -> Self {
        Self {
            directory,
            metadata,
            codec: Arc::new(XmlMessageCodec::new()),
            signatures: Arc::new(XmlSignatureEngine::new()),
        }
    }
}

/// The SAML identity provider profile.
///
/// ```rust,ignore
/// let handler = SamlProfileHandler::initialize(settings, collaborators, builder).await?;
///
/// // SSO endpoint
/// let login_redirect = handler.initiate(&raw).await?;
///
/// // Callback endpoint, after local authentication
/// let response = handler
///     .build_response(&params.saml_request, &assertion, SamlBinding::HttpPost)
///     .await?;
/// ```
pub struct SamlProfileHandler<B> {
    settings: ProfileSettings,
    callback: CallbackService,
    codec: Arc<dyn MessageCodec>,
    verifier: RequestVerifier,
    assembler: ResponseAssembler<B>,
}

impl<B: ResponseBuilder> SamlProfileHandler<B> {
    /// Builds the profile and registers the callback service.
    ///
    /// ## Errors
    ///
    /// Returns `SamlError::Directory` if the callback service cannot be
    /// registered.
    pub async fn initialize(
        settings: ProfileSettings,
        collaborators: ProfileCollaborators,
        builder: B,
    ) -> SamlResult<Self> {
        let ProfileCollaborators {
            directory,
            metadata,
            codec,
            signatures,
        } = collaborators;

        let callback = CallbackRegistrar::new(Arc::clone(&directory))
            .ensure_callback(&settings.server_prefix, &settings.callback_path)
            .await?;

        let verifier = RequestVerifier::new(
            Arc::clone(&directory),
            Arc::clone(&metadata),
            Arc::clone(&codec),
            signatures,
        );
        let assembler = ResponseAssembler::new(directory, metadata, Arc::clone(&codec), builder);

        tracing::info!(
            login_url = %settings.login_url,
            callback = %callback.url,
            mappings = settings.authn_context_mappings.len(),
            "SAML profile initialized"
        );
        Ok(Self {
            settings,
            callback,
            codec,
            verifier,
            assembler,
        })
    }

    /// Verifies an inbound request and returns the login redirect URL.
    ///
    /// ## Errors
    ///
    /// See [`RequestVerifier::verify`].
    pub async fn initiate(&self, raw: &RawProtocolMessage) -> SamlResult<String> {
        let verified = self.verifier.verify(raw).await?;
        self.login_redirect(&verified.request, &verified.context)
    }

    /// Verifies an already decoded request and returns the login redirect URL.
    ///
    /// ## Errors
    ///
    /// See [`RequestVerifier::verify_decoded`].
    pub async fn initiate_decoded(
        &self,
        request: &AuthnRequest,
        context: &MessageContext,
    ) -> SamlResult<String> {
        self.verifier.verify_decoded(request, context).await?;
        self.login_redirect(request, context)
    }

    fn login_redirect(&self, request: &AuthnRequest, context: &MessageContext) -> SamlResult<String> {
        build_authentication_redirect(
            &self.settings,
            &self.callback,
            self.codec.as_ref(),
            request,
            context,
        )
    }

    /// Builds the response for the request carried by a callback URL.
    ///
    /// ## Errors
    ///
    /// See [`ResponseAssembler::retrieve_request`] and
    /// [`ResponseAssembler::assemble`].
    pub async fn build_response(
        &self,
        saml_request: &str,
        assertion: &LocalAssertion,
        binding: SamlBinding,
    ) -> SamlResult<B::Output> {
        let request = self.assembler.retrieve_request(saml_request)?;
        self.assembler.assemble(&request, assertion, binding).await
    }

    /// Returns the profile settings.
    pub fn settings(&self) -> &ProfileSettings {
        &self.settings
    }

    /// Returns the registered callback service.
    pub fn callback(&self) -> &CallbackService {
        &self.callback
    }

    /// Returns the request verifier.
    pub fn verifier(&self) -> &RequestVerifier {
        &self.verifier
    }

    /// Returns the response assembler.
    pub fn assembler(&self) -> &ResponseAssembler<B> {
        &self.assembler
    }
}
