//! Authentication context negotiation.
//!
//! A service provider may ask for specific authentication context classes.
//! Those the identity provider knows how to satisfy are mapped to a local
//! authentication method and passed to the login as a query parameter.

use std::collections::BTreeMap;

use sso_core::config::split_mapping;
use sso_core::ConfigResult;

/// Requested class reference to local authentication method table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthnContextMappings(BTreeMap<String, String>);

impl AuthnContextMappings {
    /// Builds the table from `source->target` entries.
    ///
    /// Later entries for the same source overwrite earlier ones.
    ///
    /// ## Errors
    ///
    /// Returns `ConfigError::InvalidMapping` for an entry without `->` or
    /// with an empty side.
    pub fn from_entries<I, S>(entries: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = BTreeMap::new();
        for entry in entries {
            let (source, target) = split_mapping(entry.as_ref())?;
            table.insert(source.to_string(), target.to_string());
        }
        Ok(Self(table))
    }

    /// Returns the local method mapped to a requested class reference.
    #[must_use]
    pub fn get(&self, source: &str) -> Option<&str> {
        self.0.get(source).map(String::as_str)
    }

    /// Returns the number of mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no mappings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Appends the negotiated authentication method to `base_url`.
///
/// The first requested class reference, in request order, that has a
/// mapping wins. `base_url` is returned unchanged when nothing was
/// requested, no mappings exist, or no requested reference is mapped.
#[must_use]
pub fn negotiate(
    base_url: &str,
    requested: &[String],
    mappings: &AuthnContextMappings,
    parameter: &str,
) -> String {
    if requested.is_empty() || mappings.is_empty() {
        return base_url.to_string();
    }

    match requested.iter().find_map(|class_ref| {
        mappings.get(class_ref).map(|target| (class_ref, target))
    }) {
        Some((class_ref, target)) => {
            tracing::debug!(
                "Requested authentication context [{}] maps to [{}]",
                class_ref,
                target
            );
            format!("{base_url}&{parameter}={}", urlencoding::encode(target))
        }
        None => {
            tracing::debug!("No mapping found for requested authentication contexts {:?}", requested);
            base_url.to_string()
        }
    }
}
