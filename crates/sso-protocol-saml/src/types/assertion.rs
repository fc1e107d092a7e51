//! Local authentication assertion.
//!
//! The outcome of local authentication, validated upstream and handed to the
//! response builder.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Assertion produced by the identity provider's own authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalAssertion {
    /// Authenticated principal name.
    pub principal: String,

    /// Attributes released for the principal.
    #[serde(default)]
    pub principal_attributes: BTreeMap<String, Vec<String>>,

    /// Attributes describing the authentication event.
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,

    /// When the principal authenticated.
    pub authentication_date: DateTime<Utc>,

    /// Start of the validity window.
    pub valid_from: DateTime<Utc>,

    /// End of the validity window, if bounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl LocalAssertion {
    /// Creates an assertion for a principal authenticated now.
    #[must_use]
    pub fn new(principal: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            principal: principal.into(),
            principal_attributes: BTreeMap::new(),
            attributes: BTreeMap::new(),
            authentication_date: now,
            valid_from: now,
            valid_until: None,
        }
    }

    /// Adds a principal attribute value.
    #[must_use]
    pub fn with_principal_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.principal_attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Adds an assertion attribute value.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Sets the end of the validity window.
    #[must_use]
    pub const fn valid_until(mut self, until: DateTime<Utc>) -> Self {
        self.valid_until = Some(until);
        self
    }

    /// Returns true if `now` lies inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_from && self.valid_until.map_or(true, |until| now < until)
    }

    /// Returns true if the assertion is valid now.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Logs every field at debug level.
    pub fn log_details(&self) {
        tracing::debug!("Authenticated principal: [{}]", self.principal);
        tracing::debug!("Principal attributes: {:?}", self.principal_attributes);
        tracing::debug!("Assertion attributes: {:?}", self.attributes);
        tracing::debug!("Authentication date: [{}]", self.authentication_date);
        tracing::debug!(
            "Valid from [{}] until [{}]",
            self.valid_from,
            self.valid_until
                .map_or_else(|| "unbounded".to_string(), |until| until.to_string())
        );
        tracing::debug!("Assertion is valid: [{}]", self.is_valid());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn attributes_accumulate_values() {
        let assertion = LocalAssertion::new("casuser")
            .with_principal_attribute("memberOf", "staff")
            .with_principal_attribute("memberOf", "faculty")
            .with_attribute("authenticationMethod", "password");

        assert_eq!(assertion.principal_attributes["memberOf"], ["staff", "faculty"]);
        assert_eq!(assertion.attributes["authenticationMethod"], ["password"]);
    }

    #[test]
    fn validity_window() {
        let assertion = LocalAssertion::new("casuser");
        let now = assertion.valid_from;
        assert!(assertion.is_valid_at(now));
        assert!(!assertion.is_valid_at(now - Duration::seconds(1)));

        let bounded = assertion.valid_until(now + Duration::minutes(5));
        assert!(bounded.is_valid_at(now + Duration::minutes(4)));
        assert!(!bounded.is_valid_at(now + Duration::minutes(5)));
    }
}
