//! # sso-core
//!
//! Core configuration and error handling for the SSO identity provider.
//!
//! This crate provides the configuration surface consumed by the SAML
//! profile handlers and the service registry:
//!
//! - [`config::IdpConfig`] - server URLs, authentication context mappings,
//!   logout flags
//! - [`config::ServiceRegistryConfig`] - how the service registry is seeded
//! - [`error::ConfigError`] - configuration loading and validation failures

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod error;

pub use config::{IdpConfig, ServiceRegistryConfig};
pub use error::{ConfigError, ConfigResult};
