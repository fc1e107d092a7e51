//! Registration of the identity provider's own callback service.
//!
//! The login redirect sends the user back to the callback endpoint, so that
//! endpoint has to be an authorized service in the registry like any other
//! relying party.

use std::sync::Arc;

use rand::Rng;
use sso_services::{RegisteredService, ServiceDirectory};
use tokio::sync::Mutex;

use crate::error::SamlResult;

/// Name of the callback service registration.
pub const CALLBACK_SERVICE_NAME: &str = "RegexRegisteredService";

/// Description of the callback service registration.
pub const CALLBACK_SERVICE_DESCRIPTION: &str = "SAML Authentication Request";

/// The registered callback service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackService {
    /// Callback URL that redirect query parameters are appended to.
    pub url: String,
    /// Registry pattern matching every callback URL.
    pub pattern: String,
}

/// Makes sure the callback service is registered exactly once.
pub struct CallbackRegistrar {
    directory: Arc<dyn ServiceDirectory>,
    /// Id of a callback that was saved but not yet served because the
    /// reload after saving it failed.
    bootstrap: Mutex<Option<i64>>,
}

impl CallbackRegistrar {
    /// Creates a registrar writing to `directory`.
    pub fn new(directory: Arc<dyn ServiceDirectory>) -> Self {
        Self {
            directory,
            bootstrap: Mutex::new(None),
        }
    }

    /// Registers the callback service unless the registry already matches it.
    ///
    /// A new registration gets a random positive id and evaluation order 0,
    /// is saved, and the registry is reloaded so it is served immediately.
    /// If that reload fails, the next call retries the reload instead of
    /// saving a second registration.
    ///
    /// ## Errors
    ///
    /// Returns `SamlError::Directory` if the registry cannot be queried,
    /// written or reloaded.
    pub async fn ensure_callback(
        &self,
        server_prefix: &str,
        callback_path: &str,
    ) -> SamlResult<CallbackService> {
        let url = format!("{}{}", server_prefix.trim_end_matches('/'), callback_path);
        let pattern = format!("{url}.+");

        let mut unpublished = self.bootstrap.lock().await;
        if self.directory.matches_existing_service(&pattern).await? {
            tracing::debug!("Callback service [{}] is already registered", pattern);
            *unpublished = None;
            return Ok(CallbackService { url, pattern });
        }

        match *unpublished {
            Some(id) => {
                tracing::debug!("Callback service [{}] saved as id {} is not served yet", pattern, id);
            }
            None => {
                let id = rand::rng().random_range(1..=i64::MAX);
                let service = RegisteredService::new(id, &pattern, CALLBACK_SERVICE_NAME)
                    .with_description(CALLBACK_SERVICE_DESCRIPTION)
                    .with_evaluation_order(0);

                tracing::debug!("Saving callback service [{}] with id {}", pattern, id);
                self.directory.save(service).await?;
                *unpublished = Some(id);
            }
        }

        self.directory.reload().await?;
        *unpublished = None;
        tracing::info!("Registered SAML callback service [{}]", pattern);

        Ok(CallbackService { url, pattern })
    }
}
