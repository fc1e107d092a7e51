//! End-to-end tests for the SAML identity provider profile live under
//! `tests/`.
