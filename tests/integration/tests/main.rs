//! End-to-End Integration Tests
//!
//! These tests drive the SAML profile through its public API and its HTTP
//! endpoints, against the in-memory service registry and metadata resolver.

mod common;
mod service_registry;
mod sso_endpoints;
mod sso_flow;
