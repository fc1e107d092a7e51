//! SSO profile flow tests.

use sso_protocol_saml::codec::RawProtocolMessage;
use sso_protocol_saml::error::UNAUTHORIZED_SERVICE_CODE;
use sso_protocol_saml::profile::CallbackParameters;
use sso_protocol_saml::{
    AuthnContextClass, LocalAssertion, RequestedAuthnContext, SamlBinding, SamlError,
};
use sso_services::ServiceDirectory;

use crate::common::{sp_request, TestIdp, LOGIN_URL, SP_ACS, SP_ENTITY_ID, SP_SERVICE_ID};

#[tokio::test]
async fn login_redirect_then_response() -> anyhow::Result<()> {
    let idp = TestIdp::new(false).await?;

    let request = sp_request("_flow1")
        .with_acs_url("https://sp.example.org/custom-acs")
        .force_authn(true)
        .with_authn_context(
            RequestedAuthnContext::exact(AuthnContextClass::Password)
                .with_class_ref(AuthnContextClass::TlsClient)
                .with_class_ref(AuthnContextClass::X509),
        );
    let raw = idp.redirect_message(&request, Some("https://sp.example.org/app"), false)?;

    let redirect = idp.handler.initiate(&raw).await?;
    assert!(redirect.starts_with(&format!("{LOGIN_URL}?service=")));
    assert!(redirect.ends_with("&renew=true&authn_method=mfa-u2f"));

    let params = CallbackParameters::from_login_url(&redirect)?;
    assert_eq!(params.entity_id, SP_ENTITY_ID);
    assert_eq!(params.relay_state.as_deref(), Some("https://sp.example.org/app"));

    let assertion = LocalAssertion::new("casuser")
        .with_principal_attribute("mail", "casuser@example.org")
        .with_attribute("authenticationMethod", "mfa-u2f");
    let response = idp
        .handler
        .build_response(&params.saml_request, &assertion, SamlBinding::HttpPost)
        .await?;

    assert_eq!(response.request_id, "_flow1");
    assert_eq!(response.principal, "casuser");
    assert_eq!(response.service_id, SP_SERVICE_ID);
    assert_eq!(response.destination, "https://sp.example.org/custom-acs");
    assert_eq!(response.binding, SamlBinding::HttpPost);
    Ok(())
}

#[tokio::test]
async fn response_falls_back_to_metadata_acs() -> anyhow::Result<()> {
    let idp = TestIdp::new(false).await?;

    let raw = idp.redirect_message(&sp_request("_flow2"), None, false)?;
    let redirect = idp.handler.initiate(&raw).await?;
    assert!(!redirect.contains("authn_method"));

    let params = CallbackParameters::from_login_url(&redirect)?;
    assert!(params.relay_state.is_none());

    let response = idp
        .handler
        .build_response(&params.saml_request, &LocalAssertion::new("casuser"), SamlBinding::HttpPost)
        .await?;
    assert_eq!(response.destination, SP_ACS);
    Ok(())
}

#[tokio::test]
async fn signed_request_accepted_when_required() -> anyhow::Result<()> {
    let idp = TestIdp::new(true).await?;

    let raw = idp.redirect_message(&sp_request("_signed"), Some("state"), true)?;
    let verified = idp.handler.verifier().verify(&raw).await?;

    assert_eq!(verified.request.id, "_signed");
    assert_eq!(verified.service.id(), SP_SERVICE_ID);
    assert!(verified.facade.authn_requests_signed);
    assert!(verified.context.detached_signature.is_some());
    Ok(())
}

#[tokio::test]
async fn unsigned_request_rejected_when_required() -> anyhow::Result<()> {
    let idp = TestIdp::new(true).await?;

    let raw = idp.redirect_message(&sp_request("_unsigned"), None, false)?;
    let err = idp.handler.initiate(&raw).await.unwrap_err();

    assert!(matches!(err, SamlError::UnsignedRequest(_)));
    assert_eq!(err.error_code(), UNAUTHORIZED_SERVICE_CODE);
    Ok(())
}

#[tokio::test]
async fn security_failures_are_indistinguishable() -> anyhow::Result<()> {
    let idp = TestIdp::new(false).await?;

    let query = idp.redirect_query(&sp_request("_tampered"), Some("state"), true)?;
    let tampered = RawProtocolMessage::from_redirect_query(
        &query.replace("RelayState=state", "RelayState=forged"),
    );
    let bad_signature = idp.handler.initiate(&tampered).await.unwrap_err();
    assert!(matches!(bad_signature, SamlError::SignatureInvalid(_)));

    let unknown = sso_protocol_saml::AuthnRequest::new("https://unknown.example.com");
    let raw = idp.redirect_message(&unknown, None, false)?;
    let unknown_issuer = idp.handler.initiate(&raw).await.unwrap_err();
    assert!(matches!(unknown_issuer, SamlError::UnauthorizedService(_)));

    idp.metadata.remove(crate::common::SP_METADATA, SP_ENTITY_ID);
    let raw = idp.redirect_message(&sp_request("_nometa"), None, false)?;
    let no_metadata = idp.handler.initiate(&raw).await.unwrap_err();

    for err in [&bad_signature, &unknown_issuer, &no_metadata] {
        assert_eq!(err.error_code(), UNAUTHORIZED_SERVICE_CODE);
        assert_eq!(err.http_status(), 403);
    }
    Ok(())
}

#[tokio::test]
async fn callback_service_registered_once() -> anyhow::Result<()> {
    let idp = TestIdp::new(false).await?;
    let second = TestIdp::handler_for(&idp.registry, &idp.metadata).await?;

    assert_eq!(second.callback(), idp.handler.callback());
    assert_eq!(idp.registry.len(), 2);

    let callback_url = format!("{}?entityId=x&SAMLRequest=y", idp.handler.callback().url);
    let service = idp.registry.find_by_identifier(&callback_url).await?;
    assert!(service.is_some_and(|s| !s.is_saml() && s.evaluation_order == 0));
    Ok(())
}

#[tokio::test]
async fn service_removed_after_login_fails_late() -> anyhow::Result<()> {
    let idp = TestIdp::new(false).await?;

    let raw = idp.redirect_message(&sp_request("_late"), None, false)?;
    let redirect = idp.handler.initiate(&raw).await?;
    let params = CallbackParameters::from_login_url(&redirect)?;

    idp.metadata.remove(crate::common::SP_METADATA, SP_ENTITY_ID);
    let err = idp
        .handler
        .build_response(&params.saml_request, &LocalAssertion::new("casuser"), SamlBinding::HttpPost)
        .await
        .unwrap_err();
    assert!(matches!(err, SamlError::UnauthorizedService(_)));
    Ok(())
}
