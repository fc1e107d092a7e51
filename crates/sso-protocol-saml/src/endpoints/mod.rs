//! SAML endpoint handlers.
//!
//! Axum handlers for the SSO profile endpoints. An accepted authentication
//! request is answered with a redirect to the local login; a rejected one
//! with an error page carrying only the external error code. The callback
//! endpoint turns the user's return from the login into a SAML response.
//!
//! # Example
//!
//! ```rust,ignore
//! use sso_protocol_saml::endpoints::sso_router;
//!
//! let handler = Arc::new(handler);
//! let app = axum::Router::new()
//!     .merge(sso_router(handler.clone()))
//!     .merge(callback_router(handler, Arc::new(ticket_validator)));
//! ```

mod callback;
mod router;
mod sso;

pub use callback::*;
pub use router::*;
pub use sso::*;
