//! SSO profile routers.

use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::callback::{sso_callback, AssertionSource, CallbackState};
use super::sso::{sso_post, sso_redirect};
use crate::profile::{ResponseBuilder, SamlProfileHandler};
use crate::types::{ENDPOINT_SSO_CALLBACK, ENDPOINT_SSO_POST, ENDPOINT_SSO_REDIRECT};

/// Creates the SSO profile router.
///
/// | Method   | Path                               | Handler        |
/// |----------|------------------------------------|----------------|
/// | GET      | `/idp/profile/SAML2/Redirect/SSO`  | `sso_redirect` |
/// | POST     | `/idp/profile/SAML2/POST/SSO`      | `sso_post`     |
pub fn sso_router<B>(handler: Arc<SamlProfileHandler<B>>) -> Router
where
    B: ResponseBuilder + 'static,
{
    Router::new()
        .route(ENDPOINT_SSO_REDIRECT, get(sso_redirect::<B>))
        .route(ENDPOINT_SSO_POST, post(sso_post::<B>))
        .with_state(handler)
}

/// Creates the callback router.
///
/// | Method   | Path                           | Handler        |
/// |----------|--------------------------------|----------------|
/// | GET      | `/idp/profile/SAML2/Callback`  | `sso_callback` |
pub fn callback_router<B>(
    handler: Arc<SamlProfileHandler<B>>,
    assertions: Arc<dyn AssertionSource>,
) -> Router
where
    B: ResponseBuilder + 'static,
    B::Output: IntoResponse,
{
    Router::new()
        .route(ENDPOINT_SSO_CALLBACK, get(sso_callback::<B>))
        .with_state(CallbackState::new(handler, assertions))
}
