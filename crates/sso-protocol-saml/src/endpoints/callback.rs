//! Callback endpoint.
//!
//! The local login sends the user back here with the parameters of the
//! original request. The host's authentication layer supplies the validated
//! assertion through an [`AssertionSource`]; a user it does not recognize is
//! sent back to the login.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use super::sso::error_response;
use crate::error::SamlResult;
use crate::profile::{
    build_callback_url, build_login_url, CallbackParameters, ResponseBuilder, SamlProfileHandler,
};
use crate::types::{LocalAssertion, SamlBinding};

/// Supplies the assertion for a user returning from the local login.
#[async_trait]
pub trait AssertionSource: Send + Sync {
    /// Returns the validated assertion, or `None` when the user is not
    /// authenticated.
    ///
    /// `service_url` is the callback URL the login returned to, including
    /// any ticket the login appended.
    ///
    /// ## Errors
    ///
    /// Returns an error if the authentication layer cannot be consulted.
    async fn assertion(
        &self,
        service_url: &str,
        headers: &HeaderMap,
    ) -> SamlResult<Option<LocalAssertion>>;
}

/// Shared state of the callback endpoint.
pub struct CallbackState<B> {
    handler: Arc<SamlProfileHandler<B>>,
    assertions: Arc<dyn AssertionSource>,
}

impl<B> CallbackState<B> {
    /// Creates the endpoint state.
    pub fn new(handler: Arc<SamlProfileHandler<B>>, assertions: Arc<dyn AssertionSource>) -> Self {
        Self {
            handler,
            assertions,
        }
    }
}

impl<B> Clone for CallbackState<B> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            assertions: Arc::clone(&self.assertions),
        }
    }
}

/// GET handler for the callback endpoint.
///
/// Answers with whatever the response builder produced, over the HTTP-POST
/// binding.
pub async fn sso_callback<B>(
    State(state): State<CallbackState<B>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response
where
    B: ResponseBuilder,
    B::Output: IntoResponse,
{
    let callback_url = &state.handler.callback().url;
    let service_url = match query {
        Some(query) => format!("{callback_url}?{query}"),
        None => callback_url.clone(),
    };
    match respond(&state, &service_url, &headers).await {
        Ok(response) => response,
        Err(e) => error_response(&e).into_response(),
    }
}

async fn respond<B>(
    state: &CallbackState<B>,
    service_url: &str,
    headers: &HeaderMap,
) -> SamlResult<Response>
where
    B: ResponseBuilder,
    B::Output: IntoResponse,
{
    let params = CallbackParameters::from_service_url(service_url)?;
    let Some(assertion) = state.assertions.assertion(service_url, headers).await? else {
        tracing::debug!(
            "No authenticated user for request from [{}]; returning to login",
            params.entity_id
        );
        let retry = build_callback_url(
            &state.handler.callback().url,
            &params.entity_id,
            &params.saml_request,
            params.relay_state.as_deref(),
        )?;
        let login = build_login_url(&state.handler.settings().login_url, &retry, false, false);
        return Ok((StatusCode::FOUND, [(header::LOCATION, login)]).into_response());
    };

    tracing::debug!(
        "Building response for [{}] to [{}]",
        assertion.principal,
        params.entity_id
    );
    let output = state
        .handler
        .build_response(&params.saml_request, &assertion, SamlBinding::HttpPost)
        .await?;
    Ok(output.into_response())
}
