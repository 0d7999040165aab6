//! Session Authenticator
//! Mission: Login, silent refresh, access validation and logout over
//! stateless tokens backed by revocable auth records
//!
//! Nothing is cached between calls. Every decision is re-derived from the
//! presented token, the auth record store and the user's current rotating
//! secret, so any number of authenticators may share one store.

use crate::auth::{
    auth_store::AuthRecordStore,
    custom_key,
    jwt::TokenCodec,
    models::{AuthenticatedIdentity, Credentials, TokenPair},
    password::{compare_blocking, hash_blocking, BcryptVerifier, PasswordVerifier, DEFAULT_COST},
    user_store::UserRepository,
};
use crate::error::{AuthError, StoreError};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_ACCESS_EXPIRY_MINUTES: i64 = 30;
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

const DECOY_PASSWORD: &str = "session-auth decoy password";

#[derive(Clone)]
pub struct SessionAuthenticator {
    store: Arc<dyn AuthRecordStore>,
    users: Arc<dyn UserRepository>,
    codec: Arc<TokenCodec>,
    verifier: Arc<dyn PasswordVerifier>,
    access_expiry_minutes: i64,
    store_timeout: Duration,
    password_cost: u32,
    /// Compared against when the username is unknown, so both paths cost one
    /// bcrypt verification.
    decoy_hash: Arc<OnceCell<String>>,
}

impl SessionAuthenticator {
    pub fn new(
        store: Arc<dyn AuthRecordStore>,
        users: Arc<dyn UserRepository>,
        codec: Arc<TokenCodec>,
    ) -> Self {
        Self {
            store,
            users,
            codec,
            verifier: Arc::new(BcryptVerifier),
            access_expiry_minutes: DEFAULT_ACCESS_EXPIRY_MINUTES,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            password_cost: DEFAULT_COST,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub fn with_password_verifier(mut self, verifier: Arc<dyn PasswordVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_access_expiry_minutes(mut self, minutes: i64) -> Self {
        self.access_expiry_minutes = minutes;
        self
    }

    /// bcrypt cost that stored passwords are hashed with
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self.decoy_hash = Arc::new(OnceCell::new());
        self
    }

    /// Upper bound on any single store call
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Check credentials and open a new session.
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenPair, AuthError> {
        let user = match self
            .bounded("find_user", self.users.find_by_username(&credentials.username))
            .await
        {
            Ok(user) => Some(user),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(self.unavailable(e)),
        };

        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.decoy().await.to_string(),
        };
        let matched = compare_blocking(
            self.verifier.clone(),
            stored_hash,
            credentials.password.clone(),
        )
        .await;

        let user = match user {
            Some(user) if matched => user,
            Some(_) => {
                warn!(username = %credentials.username, reason = "bad_password", "Login rejected");
                return Err(AuthError::AuthenticationFailed);
            }
            None => {
                debug!(reason = "unknown_user", "Login rejected");
                return Err(AuthError::AuthenticationFailed);
            }
        };

        let session_id = Uuid::new_v4();
        let custom_key = custom_key::derive(&user.id, &user.token_hash);

        // Sign before persisting: a signing failure must leave no record.
        let access_token =
            self.codec
                .encode_access(&user.id, &session_id, self.access_expiry_minutes)?;
        let refresh_token = self
            .codec
            .encode_refresh(&user.id, &session_id, &custom_key)?;

        self.bounded("create_auth", self.store.create(&user.id, &session_id))
            .await
            .map_err(|e| self.unavailable(e))?;

        info!(user_id = %user.id, %session_id, "✅ Login successful");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Issue a fresh access token for the session a refresh token belongs to.
    /// The session id is kept and no record is written.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.codec.decode_refresh(refresh_token)?;

        self.bounded(
            "fetch_auth",
            self.store.fetch(&claims.user_id, &claims.session_id),
        )
        .await
        .map_err(|e| self.rejected(e, "session_revoked"))?;

        let user = self
            .bounded("find_user", self.users.find_by_id(&claims.user_id))
            .await
            .map_err(|e| self.rejected(e, "unknown_user"))?;

        if !custom_key::verify(&user.id, &user.token_hash, &claims.custom_key) {
            debug!(
                user_id = %claims.user_id,
                session_id = %claims.session_id,
                reason = "custom_key_mismatch",
                "Refresh rejected"
            );
            return Err(AuthError::AuthenticationFailed);
        }

        let access_token = self.codec.encode_access(
            &claims.user_id,
            &claims.session_id,
            self.access_expiry_minutes,
        )?;

        debug!(user_id = %claims.user_id, session_id = %claims.session_id, "Access token refreshed");
        Ok(access_token)
    }

    /// Resolve an access token to the identity it proves.
    pub async fn validate_access(
        &self,
        access_token: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let claims = self.codec.decode_access(access_token)?;

        let record = self
            .bounded(
                "fetch_auth",
                self.store.fetch(&claims.user_id, &claims.session_id),
            )
            .await
            .map_err(|e| self.rejected(e, "session_revoked"))?;

        Ok(AuthenticatedIdentity {
            user_id: record.user_id,
            session_id: record.session_id,
        })
    }

    /// Revoke the session named by the access token. Both tokens of the
    /// session stop working. Repeating the call succeeds.
    pub async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = self.codec.decode_access(access_token)?;

        match self
            .bounded(
                "delete_auth",
                self.store.delete(&claims.user_id, &claims.session_id),
            )
            .await
        {
            Ok(()) => {
                info!(user_id = %claims.user_id, session_id = %claims.session_id, "Logged out");
                Ok(())
            }
            Err(StoreError::NotFound) => {
                debug!(user_id = %claims.user_id, session_id = %claims.session_id, "Session already revoked");
                Ok(())
            }
            Err(e) => Err(self.unavailable(e)),
        }
    }

    /// Re-check the password of an authenticated user, e.g. before a
    /// password change.
    pub async fn check_password(&self, user_id: &Uuid, supplied: &str) -> Result<(), AuthError> {
        let user = self
            .bounded("find_user", self.users.find_by_id(user_id))
            .await
            .map_err(|e| self.rejected(e, "unknown_user"))?;

        if !compare_blocking(
            self.verifier.clone(),
            user.password_hash,
            supplied.to_string(),
        )
        .await
        {
            warn!(%user_id, reason = "bad_password", "Password check failed");
            return Err(AuthError::AuthenticationFailed);
        }
        Ok(())
    }

    async fn decoy(&self) -> &str {
        let cost = self.password_cost;
        self.decoy_hash
            .get_or_init(|| async move {
                hash_blocking(DECOY_PASSWORD.to_string(), cost)
                    .await
                    .unwrap_or_else(|e| {
                        error!(error = %e, "Unable to build decoy password hash");
                        String::new()
                    })
            })
            .await
            .as_str()
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "{op} timed out after {}ms",
                self.store_timeout.as_millis()
            ))),
        }
    }

    fn rejected(&self, err: StoreError, reason: &'static str) -> AuthError {
        match err {
            StoreError::NotFound => {
                debug!(reason, "Authentication failed");
                AuthError::AuthenticationFailed
            }
            other => self.unavailable(other),
        }
    }

    fn unavailable(&self, err: StoreError) -> AuthError {
        let msg = match err {
            StoreError::Unavailable(msg) => msg,
            StoreError::NotFound => "unexpected missing record".to_string(),
        };
        error!(error = %msg, "Auth store unavailable");
        AuthError::StoreUnavailable(msg)
    }
}
