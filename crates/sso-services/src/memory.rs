//! In-memory service registry.
//!
//! Saved definitions are kept in a persisted map; lookups are served from a
//! snapshot that is rebuilt on [`reload`](ServiceDirectory::reload). When
//! configured, definitions are also read from JSON files. A watched JSON
//! directory is authoritative for the definitions it supplied: a file removed
//! from it withdraws its service on the next reload.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use regex::Regex;
use sso_core::ServiceRegistryConfig;

use crate::directory::ServiceDirectory;
use crate::error::ServiceRegistryResult;
use crate::model::RegisteredService;

#[derive(Debug)]
struct CompiledService {
    service: RegisteredService,
    pattern: Regex,
}

/// In-memory implementation of [`ServiceDirectory`].
#[derive(Debug, Default)]
pub struct InMemoryServiceRegistry {
    /// Saved definitions by registry id.
    persisted: DashMap<i64, RegisteredService>,

    /// Served definitions, ordered by evaluation order then id.
    snapshot: RwLock<Arc<Vec<CompiledService>>>,

    /// JSON directory re-read on every reload.
    watched_location: Option<PathBuf>,

    /// Ids of the persisted definitions that came from JSON files.
    json_ids: RwLock<HashSet<i64>>,
}

impl InMemoryServiceRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry according to the service registry configuration.
    ///
    /// ## Errors
    ///
    /// Returns an error if seeding from JSON is enabled and a definition
    /// cannot be read, parsed, or compiled.
    pub fn from_config(config: &ServiceRegistryConfig) -> ServiceRegistryResult<Self> {
        let mut registry = Self::new();
        if config.init_from_json {
            let location = PathBuf::from(&config.json_location);
            registry.replace_json_services(read_json_directory(&location)?);
            if config.watcher_enabled {
                registry.watched_location = Some(location);
            }
        }
        registry.publish();
        Ok(registry)
    }

    /// Creates a registry serving the given services.
    ///
    /// ## Errors
    ///
    /// Returns an error if any identifier pattern does not compile.
    pub fn with_services(
        services: impl IntoIterator<Item = RegisteredService>,
    ) -> ServiceRegistryResult<Self> {
        let registry = Self::new();
        for service in services {
            service.compile_pattern()?;
            registry.persisted.insert(service.id, service);
        }
        registry.publish();
        Ok(registry)
    }

    /// Returns the number of served services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    /// Returns true if no services are served.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all served services in evaluation order.
    #[must_use]
    pub fn services(&self) -> Vec<RegisteredService> {
        self.snapshot
            .read()
            .iter()
            .map(|entry| entry.service.clone())
            .collect()
    }

    /// Swaps the JSON-sourced definitions for `services`, withdrawing those
    /// whose files are gone. Definitions saved through [`ServiceDirectory::save`]
    /// are kept.
    fn replace_json_services(&self, services: Vec<RegisteredService>) {
        let current: HashSet<i64> = services.iter().map(|service| service.id).collect();
        let mut json_ids = self.json_ids.write();
        for stale in json_ids.difference(&current) {
            if self.persisted.remove(stale).is_some() {
                tracing::info!("Withdrew service [{}]: its definition file is gone", stale);
            }
        }
        for service in services {
            self.persisted.insert(service.id, service);
        }
        *json_ids = current;
    }

    /// Rebuilds the served snapshot from the persisted definitions.
    fn publish(&self) {
        let mut compiled: Vec<CompiledService> = self
            .persisted
            .iter()
            .filter_map(|entry| {
                let service = entry.value().clone();
                match service.compile_pattern() {
                    Ok(pattern) => Some(CompiledService { service, pattern }),
                    Err(e) => {
                        tracing::warn!("Skipping service [{}]: {}", service.id, e);
                        None
                    }
                }
            })
            .collect();
        compiled.sort_by_key(|entry| (entry.service.evaluation_order, entry.service.id));
        *self.snapshot.write() = Arc::new(compiled);
    }
}

#[async_trait]
impl ServiceDirectory for InMemoryServiceRegistry {
    async fn find_by_identifier(
        &self,
        service_id: &str,
    ) -> ServiceRegistryResult<Option<RegisteredService>> {
        let snapshot = Arc::clone(&self.snapshot.read());
        Ok(snapshot
            .iter()
            .find(|entry| entry.pattern.is_match(service_id))
            .map(|entry| entry.service.clone()))
    }

    async fn save(&self, service: RegisteredService) -> ServiceRegistryResult<RegisteredService> {
        service.compile_pattern()?;
        tracing::debug!("Saving service [{}] with id [{}]", service.service_id, service.id);
        self.json_ids.write().remove(&service.id);
        self.persisted.insert(service.id, service.clone());
        Ok(service)
    }

    async fn reload(&self) -> ServiceRegistryResult<()> {
        if let Some(location) = &self.watched_location {
            self.replace_json_services(read_json_directory(location)?);
        }
        self.publish();
        tracing::debug!("Service registry reloaded with {} service(s)", self.len());
        Ok(())
    }
}

/// Reads every `*.json` definition in `location`.
///
/// Nothing is returned unless every file parses and compiles, so a broken
/// file leaves the served definitions untouched.
fn read_json_directory(location: &Path) -> ServiceRegistryResult<Vec<RegisteredService>> {
    let mut services = Vec::new();
    for entry in std::fs::read_dir(location)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let contents = std::fs::read_to_string(&path)?;
        let service: RegisteredService = serde_json::from_str(&contents)?;
        service.compile_pattern()?;
        tracing::debug!(
            "Loaded service [{}] from [{}]",
            service.service_id,
            path.display()
        );
        services.push(service);
    }
    tracing::info!(
        "Loaded {} service definition(s) from [{}]",
        services.len(),
        location.display()
    );
    Ok(services)
}
