//! Authentication Extractors
//! Mission: Turn bearer headers into verified identities for handlers

use crate::auth::{
    api::AuthApiError, models::AuthenticatedIdentity, session::SessionAuthenticator,
    user_store::UserStore,
};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

/// Shared state for the auth routes
#[derive(Clone)]
pub struct AppState {
    pub authenticator: SessionAuthenticator,
    pub user_store: UserStore,
}

/// Token from an `Authorization: Bearer <token>` header, if well formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Raw bearer token, not yet verified. Used by refresh and logout, which
/// hand the token to the authenticator themselves.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AuthApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers)
            .map(|t| BearerToken(t.to_string()))
            .ok_or(AuthApiError::Unauthorized)
    }
}

/// Identity proven by a valid access token whose session is still live.
/// Taking this as a handler argument is what protects a route.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub AuthenticatedIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(&parts.headers).ok_or(AuthApiError::Unauthorized)?;
        let identity = state.authenticator.validate_access(token).await?;
        Ok(Authenticated(identity))
    }
}
