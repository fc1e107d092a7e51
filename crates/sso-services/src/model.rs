//! Registered service domain model.
//!
//! Registered services represent relying parties allowed to request
//! authentication from the identity provider.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceRegistryError, ServiceRegistryResult};

/// Kind of a registered service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceKind {
    /// Plain service matched by its identifier pattern.
    #[default]
    Regex,
    /// SAML 2.0 service provider with published metadata.
    Saml {
        /// Where the service provider's metadata is published.
        metadata_location: String,
    },
}

/// Access strategy of a registered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessStrategy {
    /// Whether the service may use the identity provider at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for AccessStrategy {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AccessStrategy {
    /// Returns whether access to the identity provider is allowed.
    #[must_use]
    pub const fn is_service_access_allowed(&self) -> bool {
        self.enabled
    }
}

/// A service registered with the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredService {
    /// Unique registry identifier.
    pub id: i64,
    /// Regular expression matched against requesting service identifiers.
    pub service_id: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Evaluation order; lower values are matched first.
    #[serde(default)]
    pub evaluation_order: i32,
    /// Access strategy.
    #[serde(default)]
    pub access_strategy: AccessStrategy,
    /// Service kind.
    #[serde(default)]
    pub kind: ServiceKind,
}

impl RegisteredService {
    /// Creates a plain pattern-matched service.
    #[must_use]
    pub fn new(id: i64, service_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            service_id: service_id.into(),
            name: name.into(),
            description: None,
            evaluation_order: 0,
            access_strategy: AccessStrategy::default(),
            kind: ServiceKind::Regex,
        }
    }

    /// Creates a SAML service provider registration.
    #[must_use]
    pub fn saml(
        id: i64,
        service_id: impl Into<String>,
        name: impl Into<String>,
        metadata_location: impl Into<String>,
    ) -> Self {
        Self {
            kind: ServiceKind::Saml {
                metadata_location: metadata_location.into(),
            },
            ..Self::new(id, service_id, name)
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the evaluation order.
    #[must_use]
    pub const fn with_evaluation_order(mut self, order: i32) -> Self {
        self.evaluation_order = order;
        self
    }

    /// Enables or disables access for this service.
    #[must_use]
    pub const fn with_access_allowed(mut self, allowed: bool) -> Self {
        self.access_strategy.enabled = allowed;
        self
    }

    /// Returns true for SAML service provider registrations.
    #[must_use]
    pub const fn is_saml(&self) -> bool {
        matches!(self.kind, ServiceKind::Saml { .. })
    }

    /// Compiles the identifier pattern, anchored so it must match the whole
    /// service identifier.
    pub fn compile_pattern(&self) -> ServiceRegistryResult<Regex> {
        Regex::new(&format!("^(?:{})$", self.service_id))
            .map_err(|e| ServiceRegistryError::invalid_pattern(&self.service_id, e.to_string()))
    }

    /// Converts this registration into its SAML variant.
    ///
    /// Returns the registration unchanged when it is not a SAML service.
    pub fn into_saml(self) -> Result<SamlRegisteredService, Self> {
        let ServiceKind::Saml { metadata_location } = self.kind.clone() else {
            return Err(self);
        };
        Ok(SamlRegisteredService {
            service: self,
            metadata_location,
        })
    }
}

/// A registered service known to be a SAML service provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamlRegisteredService {
    /// The underlying registration.
    pub service: RegisteredService,
    /// Where the service provider's metadata is published.
    pub metadata_location: String,
}

impl SamlRegisteredService {
    /// Returns the registry identifier.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.service.id
    }

    /// Returns the service identifier pattern.
    #[must_use]
    pub fn service_id(&self) -> &str {
        &self.service.service_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.service.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_must_match_whole_identifier() {
        let service = RegisteredService::new(1, "https://sp\\.example\\.org/.*", "sp");
        let pattern = service.compile_pattern().unwrap();

        assert!(pattern.is_match("https://sp.example.org/shibboleth"));
        assert!(!pattern.is_match("evil:https://sp.example.org/shibboleth"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let service = RegisteredService::new(1, "https://(", "broken");
        assert!(matches!(
            service.compile_pattern(),
            Err(ServiceRegistryError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn saml_conversion() {
        let saml = RegisteredService::saml(7, "https://sp.example.org", "SP", "/md/sp.xml")
            .into_saml()
            .unwrap();
        assert_eq!(saml.id(), 7);
        assert_eq!(saml.metadata_location, "/md/sp.xml");

        let plain = RegisteredService::new(8, ".+", "any");
        assert!(plain.into_saml().is_err());
    }

    #[test]
    fn json_defaults() {
        let json = r#"{ "id": 3, "service_id": "https://app\\..+", "name": "app" }"#;
        let service: RegisteredService = serde_json::from_str(json).unwrap();
        assert_eq!(service.evaluation_order, 0);
        assert!(service.access_strategy.is_service_access_allowed());
        assert_eq!(service.kind, ServiceKind::Regex);

        let json = r#"{
            "id": 4,
            "service_id": "https://sp.example.org",
            "name": "sp",
            "access_strategy": { "enabled": false },
            "kind": { "type": "saml", "metadata_location": "/md/sp.xml" }
        }"#;
        let service: RegisteredService = serde_json::from_str(json).unwrap();
        assert!(service.is_saml());
        assert!(!service.access_strategy.is_service_access_allowed());
    }
}
