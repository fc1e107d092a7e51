//! The SAML identity provider profile.
//!
//! An inbound authentication request is verified by the
//! [`RequestVerifier`], which resolves the issuing service provider through
//! the service registry and its metadata and enforces the signing policy.
//! The user is then redirected to the local login with a callback URL that
//! carries the request, optionally annotated with a negotiated
//! authentication context. On callback re-entry the [`ResponseAssembler`]
//! resolves the service provider again and hands off to a
//! [`ResponseBuilder`].
//!
//! [`SamlProfileHandler`] wires these together.

mod assembler;
mod authn_context;
mod callback;
mod handler;
mod redirect;
mod resolve;
mod settings;
mod signature;
mod verifier;

pub use assembler::{ResponseAssembler, ResponseBuilder};
pub use authn_context::{negotiate, AuthnContextMappings};
pub use callback::{
    CallbackRegistrar, CallbackService, CALLBACK_SERVICE_DESCRIPTION, CALLBACK_SERVICE_NAME,
};
pub use handler::{ProfileCollaborators, SamlProfileHandler};
pub use redirect::{
    build_authentication_redirect, build_callback_url, build_login_url, CallbackParameters,
};
pub use settings::ProfileSettings;
pub use signature::verify_request_signature;
pub use verifier::{RequestVerifier, VerifiedRequest};

#[cfg(test)]
pub(crate) mod mocks;
