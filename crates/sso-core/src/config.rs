//! Identity provider configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults,
//! or deserialized from any `serde` source.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Separator between the source and target of an authentication context mapping.
pub const MAPPING_SEPARATOR: &str = "->";

/// Default name of the login request parameter carrying the negotiated
/// authentication context.
pub const DEFAULT_AUTHN_CONTEXT_PARAMETER: &str = "authn_method";

/// Identity provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct IdpConfig {
    /// Public name of the server (scheme, host and port).
    pub server_name: String,

    /// Server prefix: the public name plus the application context path.
    pub server_prefix: String,

    /// URL of the local login endpoint.
    pub login_url: String,

    /// URL of the local logout endpoint.
    pub logout_url: String,

    /// Authentication context class mappings, each `source->target`.
    #[serde(default)]
    pub authn_context_class_mappings: Vec<String>,

    /// Name of the login request parameter that carries the mapped context.
    #[serde(default = "default_authn_context_parameter")]
    pub authn_context_request_parameter: String,

    /// Require logout requests to be signed.
    #[serde(default = "default_true")]
    pub force_signed_logout_requests: bool,

    /// Disable single logout callbacks to service providers.
    #[serde(default)]
    pub single_logout_callbacks_disabled: bool,

    /// Service registry configuration.
    #[serde(default)]
    pub service_registry: ServiceRegistryConfig,
}

/// Service registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRegistryConfig {
    /// Seed the registry from JSON service definitions at startup.
    #[serde(default)]
    pub init_from_json: bool,

    /// Directory holding JSON service definitions.
    #[serde(default = "default_json_location")]
    pub json_location: String,

    /// Re-read the JSON location whenever the registry is reloaded.
    #[serde(default = "default_true")]
    pub watcher_enabled: bool,
}

impl Default for ServiceRegistryConfig {
    fn default() -> Self {
        Self {
            init_from_json: false,
            json_location: default_json_location(),
            watcher_enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_json_location() -> String {
    "services".to_string()
}

fn default_authn_context_parameter() -> String {
    DEFAULT_AUTHN_CONTEXT_PARAMETER.to_string()
}

impl IdpConfig {
    /// Creates a configuration for the given public server name, deriving
    /// every URL from it.
    #[must_use]
    pub fn for_server(server_name: impl Into<String>) -> Self {
        let server_name = server_name.into();
        let server_prefix = format!("{}/cas", server_name.trim_end_matches('/'));
        Self {
            login_url: format!("{server_prefix}/login"),
            logout_url: format!("{server_prefix}/logout"),
            server_name,
            server_prefix,
            authn_context_class_mappings: Vec::new(),
            authn_context_request_parameter: default_authn_context_parameter(),
            force_signed_logout_requests: true,
            single_logout_callbacks_disabled: false,
            service_registry: ServiceRegistryConfig::default(),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// A `.env` file is honored when present. Every variable is optional;
    /// URLs not set explicitly are derived from `SSO_SERVER_NAME`.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();

        let server_name =
            std::env::var("SSO_SERVER_NAME").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let mut config = Self::for_server(server_name);

        if let Ok(prefix) = std::env::var("SSO_SERVER_PREFIX") {
            config.login_url = format!("{prefix}/login");
            config.logout_url = format!("{prefix}/logout");
            config.server_prefix = prefix;
        }
        if let Ok(login_url) = std::env::var("SSO_LOGIN_URL") {
            config.login_url = login_url;
        }
        if let Ok(logout_url) = std::env::var("SSO_LOGOUT_URL") {
            config.logout_url = logout_url;
        }

        config.authn_context_class_mappings = std::env::var("SSO_AUTHN_CONTEXT_MAPPINGS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        if let Ok(param) = std::env::var("SSO_AUTHN_CONTEXT_PARAMETER") {
            config.authn_context_request_parameter = param;
        }

        config.force_signed_logout_requests =
            env_flag("SSO_FORCE_SIGNED_LOGOUT_REQUESTS")?.unwrap_or(true);
        config.single_logout_callbacks_disabled =
            env_flag("SSO_SINGLE_LOGOUT_CALLBACKS_DISABLED")?.unwrap_or(false);

        config.service_registry.init_from_json =
            env_flag("SSO_SERVICE_REGISTRY_INIT_FROM_JSON")?.unwrap_or(false);
        if let Ok(location) = std::env::var("SSO_SERVICE_REGISTRY_JSON_LOCATION") {
            config.service_registry.json_location = location;
        }
        config.service_registry.watcher_enabled =
            env_flag("SSO_SERVICE_REGISTRY_WATCHER_ENABLED")?.unwrap_or(true);

        config.validate()?;
        tracing::debug!(
            server_prefix = %config.server_prefix,
            mappings = config.authn_context_class_mappings.len(),
            "Loaded identity provider configuration"
        );
        Ok(config)
    }

    /// Validates URLs and authentication context mappings.
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("server_name", &self.server_name),
            ("server_prefix", &self.server_prefix),
            ("login_url", &self.login_url),
            ("logout_url", &self.logout_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::invalid_url(field, e.to_string()))?;
        }

        if self.authn_context_request_parameter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "authn_context_request_parameter",
                value: self.authn_context_request_parameter.clone(),
            });
        }

        for entry in &self.authn_context_class_mappings {
            split_mapping(entry)?;
        }
        Ok(())
    }
}

/// Splits a `source->target` mapping entry into its trimmed halves.
pub fn split_mapping(entry: &str) -> ConfigResult<(&str, &str)> {
    let (source, target) = entry
        .split_once(MAPPING_SEPARATOR)
        .ok_or_else(|| ConfigError::InvalidMapping(entry.to_string()))?;
    let (source, target) = (source.trim(), target.trim());
    if source.is_empty() || target.is_empty() {
        return Err(ConfigError::InvalidMapping(entry.to_string()));
    }
    Ok((source, target))
}

fn env_flag(name: &'static str) -> ConfigResult<Option<bool>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { field: name, value }),
        Err(_) => Ok(None),
    }
}
