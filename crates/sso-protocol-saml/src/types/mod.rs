//! SAML 2.0 types and data structures.
//!
//! Contains the authentication request model, the locally produced
//! assertion handed to response builders, and protocol constants.

mod assertion;
mod authn_request;
mod constants;

pub use assertion::*;
pub use authn_request::*;
pub use constants::*;
