//! # sso-services
//!
//! Registered services and the service registry.
//!
//! A registered service describes a relying party that may use the identity
//! provider. Services are matched by a regular-expression pattern over the
//! requesting service identifier and carry an access strategy.
//!
//! - [`model`] - [`RegisteredService`] and its SAML variant
//! - [`directory`] - the [`ServiceDirectory`] provider trait
//! - [`memory`] - an in-memory registry, optionally seeded from JSON files

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod directory;
pub mod error;
pub mod memory;
pub mod model;

pub use directory::ServiceDirectory;
pub use error::{ServiceRegistryError, ServiceRegistryResult};
pub use memory::InMemoryServiceRegistry;
pub use model::{AccessStrategy, RegisteredService, SamlRegisteredService, ServiceKind};
