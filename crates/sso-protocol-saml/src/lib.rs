//! SAML 2.0 identity provider profile handling.
//!
//! This crate verifies inbound SAML authentication requests and assembles
//! the outbound response once the user has authenticated locally:
//!
//! - **Request verification** - issuer resolution, service registry lookup,
//!   metadata resolution and signature policy enforcement
//! - **Login redirect** - callback URL construction and authentication
//!   context negotiation
//! - **Response assembly** - re-resolution of the service and its metadata,
//!   then delegation to a [`profile::ResponseBuilder`]
//! - **Callback registration** - the identity provider's own callback
//!   service in the registry
//!
//! # Architecture
//!
//! - [`types`] - SAML types and protocol constants
//! - [`bindings`] - HTTP-POST and HTTP-Redirect binding codecs
//! - [`codec`] - message decoding into requests plus message context
//! - [`signature`] - signature engine trait and XML-DSig implementation
//! - [`metadata`] - service provider metadata facades and resolvers
//! - [`profile`] - the verification and assembly protocol
//! - [`endpoints`] - Axum handlers for the SSO profile endpoints
//! - [`error`] - error types for SAML operations
//!
//! # Example
//!
//! ```rust,ignore
//! use sso_protocol_saml::profile::{ProfileCollaborators, ProfileSettings, SamlProfileHandler};
//!
//! let settings = ProfileSettings::from_config(&config)?;
//! let handler = SamlProfileHandler::initialize(settings, collaborators, response_builder).await?;
//! let login_redirect = handler.initiate(&raw_message).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod codec;
pub mod endpoints;
pub mod error;
pub mod metadata;
pub mod profile;
pub mod signature;
pub mod types;

pub use error::{SamlError, SamlResult};
pub use types::*;
