//! SSO endpoint tests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine};
use sso_protocol_saml::endpoints::{callback_router, sso_router, AssertionSource};
use sso_protocol_saml::error::{PROTOCOL_ERROR_CODE, UNAUTHORIZED_SERVICE_CODE};
use sso_protocol_saml::profile::CallbackParameters;
use sso_protocol_saml::{
    signature_algorithms, AuthnRequest, LocalAssertion, SamlResult, ENDPOINT_SSO_CALLBACK,
    ENDPOINT_SSO_POST, ENDPOINT_SSO_REDIRECT,
};
use tower::ServiceExt;

use crate::common::{sp_request, TestIdp, LOGIN_URL, SP_ACS, SP_ENTITY_ID};

async fn body_text(response: axum::response::Response) -> anyhow::Result<String> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[tokio::test]
async fn redirect_binding_sends_user_to_login() -> anyhow::Result<()> {
    let idp = TestIdp::new(true).await?;
    let query = idp.redirect_query(&sp_request("_http1"), Some("rs"), true)?;

    let response = sso_router(idp.handler.clone())
        .oneshot(
            Request::builder()
                .uri(format!("{ENDPOINT_SSO_REDIRECT}?{query}"))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(location.starts_with(LOGIN_URL));

    let params = CallbackParameters::from_login_url(location)?;
    assert_eq!(params.entity_id, SP_ENTITY_ID);
    assert_eq!(params.relay_state.as_deref(), Some("rs"));
    Ok(())
}

#[tokio::test]
async fn form_encoded_signed_query_is_accepted() -> anyhow::Result<()> {
    let idp = TestIdp::new(true).await?;
    let unsigned = idp.redirect_query(&sp_request("_http3"), None, false)?;
    let saml_request = url::form_urlencoded::parse(unsigned.as_bytes())
        .find(|(key, _)| key == "SAMLRequest")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();

    // Spaces as '+' and lowercase escapes, as Java and .NET signers send them.
    let mut query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("SAMLRequest", &saml_request)
        .append_pair("RelayState", "https://sp.example.org/app?page=1 2")
        .finish();
    let sig_alg: String =
        url::form_urlencoded::byte_serialize(signature_algorithms::ECDSA_SHA256.as_bytes())
            .collect::<String>()
            .to_lowercase();
    query.push_str(&format!("&SigAlg={sig_alg}"));
    let signature = idp.signer.sign(query.as_bytes())?;
    let signature: String = url::form_urlencoded::byte_serialize(signature.as_bytes()).collect();
    query.push_str(&format!("&Signature={signature}"));
    assert!(query.contains("page%3D1+2") && query.contains("%3a%2f%2f"));

    let response = sso_router(idp.handler.clone())
        .oneshot(
            Request::builder()
                .uri(format!("{ENDPOINT_SSO_REDIRECT}?{query}"))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let params = CallbackParameters::from_login_url(location)?;
    assert_eq!(
        params.relay_state.as_deref(),
        Some("https://sp.example.org/app?page=1 2")
    );
    Ok(())
}

#[tokio::test]
async fn post_binding_sends_user_to_login() -> anyhow::Result<()> {
    let idp = TestIdp::new(false).await?;
    let encoded = STANDARD.encode(sp_request("_http2").to_xml());
    let form = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("SAMLRequest", &encoded)
        .append_pair("RelayState", "rs")
        .finish();

    let response = sso_router(idp.handler.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(ENDPOINT_SSO_POST)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(response.headers().contains_key(header::LOCATION));
    Ok(())
}

#[tokio::test]
async fn unknown_issuer_gets_the_shared_error_page() -> anyhow::Result<()> {
    let idp = TestIdp::new(false).await?;
    let query = idp.redirect_query(&AuthnRequest::new("https://unknown.example.com"), None, false)?;

    let response = sso_router(idp.handler.clone())
        .oneshot(
            Request::builder()
                .uri(format!("{ENDPOINT_SSO_REDIRECT}?{query}"))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_text(response).await?;
    assert!(body.contains(UNAUTHORIZED_SERVICE_CODE));
    assert!(!body.contains("unknown.example.com"));
    Ok(())
}

#[tokio::test]
async fn undecodable_request_is_a_bad_request() -> anyhow::Result<()> {
    let idp = TestIdp::new(false).await?;

    let response = sso_router(idp.handler.clone())
        .oneshot(
            Request::builder()
                .uri(format!("{ENDPOINT_SSO_REDIRECT}?SAMLRequest=bm90LWRlZmxhdGVk"))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await?.contains(PROTOCOL_ERROR_CODE));
    Ok(())
}

/// Accepts the one ticket the test login hands out.
struct TicketAssertions;

#[async_trait]
impl AssertionSource for TicketAssertions {
    async fn assertion(
        &self,
        service_url: &str,
        _headers: &HeaderMap,
    ) -> SamlResult<Option<LocalAssertion>> {
        let ticket = url::Url::parse(service_url)
            .ok()
            .and_then(|url| url.query_pairs().find(|(k, _)| k == "ticket").map(|(_, v)| v.into_owned()));
        Ok((ticket.as_deref() == Some("ST-1")).then(|| LocalAssertion::new("casuser")))
    }
}

/// Sends a request through the SSO endpoint and returns the query of the
/// callback URL the login was told to return to.
async fn callback_query(idp: &TestIdp, id: &str) -> anyhow::Result<String> {
    let query = idp.redirect_query(&sp_request(id), Some("rs"), true)?;
    let response = sso_router(idp.handler.clone())
        .oneshot(
            Request::builder()
                .uri(format!("{ENDPOINT_SSO_REDIRECT}?{query}"))
                .body(Body::empty())?,
        )
        .await?;
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let service = url::Url::parse(location)?
        .query_pairs()
        .find(|(k, _)| k == "service")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();
    Ok(url::Url::parse(&service)?.query().unwrap_or_default().to_string())
}

#[tokio::test]
async fn callback_with_ticket_issues_the_response() -> anyhow::Result<()> {
    let idp = TestIdp::new(true).await?;
    let query = callback_query(&idp, "_cb1").await?;

    let response = callback_router(idp.handler.clone(), Arc::new(TicketAssertions))
        .oneshot(
            Request::builder()
                .uri(format!("{ENDPOINT_SSO_CALLBACK}?{query}&ticket=ST-1"))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await?, format!("_cb1 casuser {SP_ACS}"));
    Ok(())
}

#[tokio::test]
async fn callback_without_user_returns_to_login() -> anyhow::Result<()> {
    let idp = TestIdp::new(true).await?;
    let query = callback_query(&idp, "_cb2").await?;

    let response = callback_router(idp.handler.clone(), Arc::new(TicketAssertions))
        .oneshot(
            Request::builder()
                .uri(format!("{ENDPOINT_SSO_CALLBACK}?{query}&ticket=ST-stale"))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(location.starts_with(LOGIN_URL));
    assert!(!location.contains("ST-stale"));
    let params = CallbackParameters::from_login_url(location)?;
    assert_eq!(params.entity_id, SP_ENTITY_ID);
    assert_eq!(params.relay_state.as_deref(), Some("rs"));
    Ok(())
}

#[tokio::test]
async fn callback_without_request_is_a_bad_request() -> anyhow::Result<()> {
    let idp = TestIdp::new(false).await?;

    let response = callback_router(idp.handler.clone(), Arc::new(TicketAssertions))
        .oneshot(
            Request::builder()
                .uri(format!("{ENDPOINT_SSO_CALLBACK}?ticket=ST-1"))
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await?.contains(PROTOCOL_ERROR_CODE));
    Ok(())
}
