//! Service registry seeding and callback registration tests.

use std::path::PathBuf;
use std::sync::Arc;

use sso_core::ServiceRegistryConfig;
use sso_protocol_saml::metadata::{InMemoryMetadataResolver, ServiceMetadataFacade};
use sso_protocol_saml::profile::CALLBACK_SERVICE_NAME;
use sso_services::{InMemoryServiceRegistry, ServiceDirectory};

use crate::common::{init_tracing, sp_request, TestIdp, SP_ENTITY_ID, SP_METADATA};

struct ServiceDir(PathBuf);

impl ServiceDir {
    fn create() -> anyhow::Result<Self> {
        let dir = std::env::temp_dir().join(format!("sso-services-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        Ok(Self(dir))
    }

    fn write(&self, name: &str, service: &serde_json::Value) -> anyhow::Result<()> {
        std::fs::write(self.0.join(name), serde_json::to_string_pretty(service)?)?;
        Ok(())
    }

    fn config(&self) -> ServiceRegistryConfig {
        ServiceRegistryConfig {
            init_from_json: true,
            json_location: self.0.to_string_lossy().into_owned(),
            watcher_enabled: true,
        }
    }
}

impl Drop for ServiceDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[tokio::test]
async fn json_seeded_provider_completes_the_flow() -> anyhow::Result<()> {
    init_tracing();
    let dir = ServiceDir::create()?;
    dir.write(
        "sp.json",
        &serde_json::json!({
            "id": 2001,
            "service_id": "https://sp\\.example\\.org/.*",
            "name": "Seeded SP",
            "evaluation_order": 10,
            "kind": { "type": "saml", "metadata_location": SP_METADATA }
        }),
    )?;

    let registry = Arc::new(InMemoryServiceRegistry::from_config(&dir.config())?);
    let metadata = Arc::new(InMemoryMetadataResolver::new());
    metadata.register(SP_METADATA, ServiceMetadataFacade::new(SP_ENTITY_ID));

    let handler = TestIdp::handler_for(&registry, &metadata).await?;
    let service_names: Vec<String> = registry.services().into_iter().map(|s| s.name).collect();
    assert_eq!(service_names, vec![CALLBACK_SERVICE_NAME.to_string(), "Seeded SP".to_string()]);

    let raw = sso_protocol_saml::codec::RawProtocolMessage::post(base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        sp_request("_seeded").to_xml(),
    ));
    let verified = handler.verifier().verify(&raw).await?;
    assert_eq!(verified.service.id(), 2001);
    Ok(())
}

#[tokio::test]
async fn disabled_provider_is_refused_after_reload() -> anyhow::Result<()> {
    init_tracing();
    let dir = ServiceDir::create()?;
    let mut service = serde_json::json!({
        "id": 2002,
        "service_id": "https://sp\\.example\\.org/.*",
        "name": "Seeded SP",
        "kind": { "type": "saml", "metadata_location": SP_METADATA }
    });
    dir.write("sp.json", &service)?;

    let registry = Arc::new(InMemoryServiceRegistry::from_config(&dir.config())?);
    let metadata = Arc::new(InMemoryMetadataResolver::new());
    metadata.register(SP_METADATA, ServiceMetadataFacade::new(SP_ENTITY_ID));
    let handler = TestIdp::handler_for(&registry, &metadata).await?;

    let raw = sso_protocol_saml::codec::RawProtocolMessage::post(base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        sp_request("_disabled").to_xml(),
    ));
    assert!(handler.verifier().verify(&raw).await.is_ok());

    service["access_strategy"] = serde_json::json!({ "enabled": false });
    dir.write("sp.json", &service)?;
    registry.reload().await?;

    let err = handler.verifier().verify(&raw).await.unwrap_err();
    assert!(err.is_authorization_failure());
    Ok(())
}
