//! Single Sign-On endpoint.
//!
//! Receives authentication requests and redirects to the local login.

use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;

use crate::codec::RawProtocolMessage;
use crate::error::{SamlError, SamlResult};
use crate::profile::{ResponseBuilder, SamlProfileHandler};

/// Form data for the HTTP-POST binding.
#[derive(Debug, Default, Deserialize)]
pub struct SsoPostForm {
    /// The SAML request (base64).
    #[serde(rename = "SAMLRequest")]
    pub saml_request: Option<String>,

    /// Relay state.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

impl SsoPostForm {
    /// Converts the form into a raw protocol message.
    #[must_use]
    pub fn into_message(self) -> RawProtocolMessage {
        RawProtocolMessage::from_post_form(self.saml_request, self.relay_state)
    }
}

/// GET handler for the SSO endpoint (HTTP-Redirect binding).
///
/// The query string is taken raw so a detached signature is checked over
/// the octets the service provider signed.
pub async fn sso_redirect<B: ResponseBuilder>(
    State(handler): State<Arc<SamlProfileHandler<B>>>,
    RawQuery(query): RawQuery,
) -> Response {
    let message = RawProtocolMessage::from_redirect_query(query.as_deref().unwrap_or_default());
    login_redirect(handler.initiate(&message).await)
}

/// POST handler for the SSO endpoint (HTTP-POST binding).
pub async fn sso_post<B: ResponseBuilder>(
    State(handler): State<Arc<SamlProfileHandler<B>>>,
    Form(form): Form<SsoPostForm>,
) -> Response {
    login_redirect(handler.initiate(&form.into_message()).await)
}

fn login_redirect(result: SamlResult<String>) -> Response {
    match result {
        Ok(url) => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// Renders a profile error.
///
/// Only the external error code is shown, so authorization and signature
/// failures are indistinguishable to the caller.
pub fn error_response(err: &SamlError) -> (StatusCode, Html<String>) {
    if err.is_authorization_failure() {
        tracing::warn!("Rejected SAML authentication request: {}", err);
    } else {
        tracing::error!("SAML authentication request failed: {}", err);
    }

    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>SAML Error</title></head>
<body>
<h1>SAML Error</h1>
<p>{}</p>
</body>
</html>"#,
        err.error_code()
    );
    (status, Html(html))
}
