//! Service directory provider trait.

use async_trait::async_trait;

use crate::error::ServiceRegistryResult;
use crate::model::RegisteredService;

/// Provider for service registry lookups and administration.
///
/// Implementations must be thread-safe and support concurrent access. Reads
/// are expected to dominate; writes become visible to lookups only after
/// [`reload`](ServiceDirectory::reload).
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Finds the registered service whose pattern matches `service_id`.
    ///
    /// When several services match, the one with the lowest evaluation
    /// order wins.
    async fn find_by_identifier(
        &self,
        service_id: &str,
    ) -> ServiceRegistryResult<Option<RegisteredService>>;

    /// Returns whether the service's access strategy allows it to use the
    /// identity provider.
    fn is_access_allowed(&self, service: &RegisteredService) -> bool {
        service.access_strategy.is_service_access_allowed()
    }

    /// Returns whether any registered service matches `service_id`.
    async fn matches_existing_service(&self, service_id: &str) -> ServiceRegistryResult<bool> {
        Ok(self.find_by_identifier(service_id).await?.is_some())
    }

    /// Persists a service definition, replacing any with the same id.
    ///
    /// ## Errors
    ///
    /// Returns `ServiceRegistryError::InvalidPattern` if the identifier
    /// pattern does not compile.
    async fn save(&self, service: RegisteredService) -> ServiceRegistryResult<RegisteredService>;

    /// Reloads the registry so that saved definitions are served.
    async fn reload(&self) -> ServiceRegistryResult<()>;
}
