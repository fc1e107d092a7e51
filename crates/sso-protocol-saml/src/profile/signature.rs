//! Request signing policy.

use crate::codec::MessageContext;
use crate::error::{SamlError, SamlResult};
use crate::metadata::ServiceMetadataFacade;
use crate::signature::SignatureEngine;
use crate::types::AuthnRequest;

/// Enforces the service provider's signing requirement.
///
/// | signed | required | outcome |
/// |--------|----------|---------|
/// | no | no | accepted without cryptography |
/// | no | yes | `SamlError::UnsignedRequest` |
/// | yes | either | verified; failure is `SamlError::SignatureInvalid` |
///
/// ## Errors
///
/// See the table above.
pub fn verify_request_signature(
    engine: &dyn SignatureEngine,
    request: &AuthnRequest,
    context: &MessageContext,
    facade: &ServiceMetadataFacade,
) -> SamlResult<()> {
    if !engine.is_signed(context) {
        if facade.authn_requests_signed {
            tracing::error!(
                "Authentication request from [{}] is not signed but metadata requires signed requests",
                facade.entity_id
            );
            return Err(SamlError::UnsignedRequest(facade.entity_id.clone()));
        }
        tracing::debug!(
            "Authentication request from [{}] is not signed and does not need to be",
            facade.entity_id
        );
        return Ok(());
    }

    tracing::debug!(
        "Validating signature of request [{}] from [{}]",
        request.id,
        facade.entity_id
    );
    match engine.verify(request, facade, context) {
        Ok(true) => {
            tracing::debug!("Signature of request [{}] is valid", request.id);
            Ok(())
        }
        Ok(false) => {
            tracing::warn!(
                "Signature of request [{}] from [{}] did not verify",
                request.id,
                facade.entity_id
            );
            Err(SamlError::SignatureInvalid(format!(
                "signature of request {} does not match any signing key of {}",
                request.id, facade.entity_id
            )))
        }
        Err(SamlError::SignatureInvalid(reason)) => {
            tracing::warn!("Signature of request [{}] rejected: {}", request.id, reason);
            Err(SamlError::SignatureInvalid(reason))
        }
        Err(e) => {
            tracing::warn!("Signature of request [{}] could not be checked: {}", request.id, e);
            Err(SamlError::SignatureInvalid(e.to_string()))
        }
    }
}
