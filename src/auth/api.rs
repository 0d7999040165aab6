//! Authentication API Endpoints
//! Mission: Expose login, refresh, logout and account endpoints over HTTP

use crate::auth::{
    middleware::{AppState, Authenticated, BearerToken},
    models::{
        AuthenticatedIdentity, Credentials, LoginResponse, PasswordChange, RefreshResponse,
        UserResponse,
    },
};
use crate::error::{AuthError, StoreError, UserWriteError};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{debug, error, warn};

const MIN_PASSWORD_LEN: usize = 8;

/// All auth routes, bound to their state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .route("/me", get(me).delete(delete_me))
        .route("/password", post(change_password))
        .route("/rotate-secret", post(rotate_secret))
        .with_state(state)
}

/// Health check - GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Login endpoint - POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    debug!(username = %payload.username, "Login attempt");

    let pair = state.authenticator.login(&payload).await?;

    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        username: payload.username,
    }))
}

/// Signup endpoint - POST /signup
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<(StatusCode, Json<UserResponse>), AuthApiError> {
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AuthApiError::WeakPassword);
    }

    let user = state
        .user_store
        .create_user(&payload.username, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

/// Change password - POST /password
///
/// Requires the current password. Every refresh token the caller holds stops
/// working; sessions and access tokens stay valid until they expire.
pub async fn change_password(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Json(payload): Json<PasswordChange>,
) -> Result<StatusCode, AuthApiError> {
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(AuthApiError::WeakPassword);
    }

    state
        .authenticator
        .check_password(&identity.user_id, &payload.current_password)
        .await?;
    state
        .user_store
        .update_password(&identity.user_id, &payload.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete own account - DELETE /me
///
/// Soft delete: the account disappears and every session is revoked.
pub async fn delete_me(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<StatusCode, AuthApiError> {
    state.user_store.delete_user(&identity.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Refresh endpoint - POST /refresh-token (bearer refresh token)
pub async fn refresh_token(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<RefreshResponse>, AuthApiError> {
    let access_token = state.authenticator.refresh(&token).await?;
    Ok(Json(RefreshResponse { access_token }))
}

/// Logout endpoint - POST /logout (bearer access token)
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, AuthApiError> {
    state.authenticator.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current identity - GET /me
pub async fn me(Authenticated(identity): Authenticated) -> Json<AuthenticatedIdentity> {
    Json(identity)
}

/// Rotate the caller's refresh secret - POST /rotate-secret
///
/// Every refresh token the caller holds stops working. Access tokens,
/// including the one used for this call, stay valid until they expire.
pub async fn rotate_secret(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<StatusCode, AuthApiError> {
    state.user_store.rotate_token_hash(&identity.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    Unauthorized,
    InvalidUsername,
    WeakPassword,
    UserAlreadyExists,
    StoreUnavailable,
    InternalError,
}

impl From<AuthError> for AuthApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthenticationFailed => AuthApiError::Unauthorized,
            AuthError::StoreUnavailable(_) => AuthApiError::StoreUnavailable,
            AuthError::Configuration(_) => AuthApiError::InternalError,
        }
    }
}

/// User writes on behalf of an authenticated caller: a missing user means
/// the account went away under the token.
impl From<StoreError> for AuthApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AuthApiError::Unauthorized,
            StoreError::Unavailable(msg) => {
                error!(error = %msg, "User store unavailable");
                AuthApiError::StoreUnavailable
            }
        }
    }
}

impl From<UserWriteError> for AuthApiError {
    fn from(err: UserWriteError) -> Self {
        match err {
            UserWriteError::EmptyUsername => AuthApiError::InvalidUsername,
            UserWriteError::Duplicate => {
                warn!("Signup rejected: username taken");
                AuthApiError::UserAlreadyExists
            }
            UserWriteError::Hashing(msg) => {
                error!(error = %msg, "Password hashing failed");
                AuthApiError::InternalError
            }
            UserWriteError::Store(e) => e.into(),
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication failed"),
            AuthApiError::InvalidUsername => {
                (StatusCode::BAD_REQUEST, "Username must not be empty")
            }
            AuthApiError::WeakPassword => (
                StatusCode::BAD_REQUEST,
                "Password must be at least 8 characters",
            ),
            AuthApiError::UserAlreadyExists => (StatusCode::CONFLICT, "Username already exists"),
            AuthApiError::StoreUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
            ),
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}
