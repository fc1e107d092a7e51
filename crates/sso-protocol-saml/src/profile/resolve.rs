//! Service and metadata resolution shared by verification and assembly.

use sso_services::{SamlRegisteredService, ServiceDirectory};

use crate::error::{SamlError, SamlResult};
use crate::metadata::{MetadataLookup, MetadataResolver, ServiceMetadataFacade};

/// Resolves the registered SAML service for an issuer.
///
/// A blank issuer, an unregistered issuer, a service denied access and a
/// registration that is not a SAML service provider all fail as
/// `SamlError::UnauthorizedService`.
pub(crate) async fn resolve_service(
    directory: &dyn ServiceDirectory,
    issuer: &str,
) -> SamlResult<SamlRegisteredService> {
    if issuer.trim().is_empty() {
        tracing::warn!("Authentication request does not carry an issuer");
        return Err(SamlError::unauthorized("issuer is missing"));
    }

    tracing::debug!("Checking service registry for [{}]", issuer);
    let Some(service) = directory.find_by_identifier(issuer).await? else {
        tracing::warn!("Entity [{}] is not registered with the service registry", issuer);
        return Err(SamlError::unauthorized(format!("{issuer} is not registered")));
    };

    if !directory.is_access_allowed(&service) {
        tracing::warn!(
            "Entity [{}] is not authorized to use single sign-on (service {})",
            issuer,
            service.id
        );
        return Err(SamlError::unauthorized(format!("{issuer} is not allowed")));
    }

    service.into_saml().map_err(|service| {
        tracing::error!(
            "Service [{}] matching [{}] is not a SAML service provider",
            service.service_id,
            issuer
        );
        SamlError::unauthorized(format!("{issuer} is not a SAML service"))
    })
}

/// Resolves the metadata facade of a service.
pub(crate) async fn resolve_facade(
    resolver: &dyn MetadataResolver,
    service: &SamlRegisteredService,
    lookup: MetadataLookup<'_>,
) -> SamlResult<ServiceMetadataFacade> {
    let entity_id = lookup.entity_id();
    match resolver.resolve(service, lookup).await? {
        Some(facade) => {
            tracing::debug!(
                "Located SAML metadata for [{}] at [{}]",
                entity_id,
                service.metadata_location
            );
            Ok(facade)
        }
        None => {
            tracing::warn!(
                "Could not locate SAML metadata for [{}] at [{}]",
                entity_id,
                service.metadata_location
            );
            Err(SamlError::unauthorized(format!(
                "metadata not found for {entity_id}"
            )))
        }
    }
}
