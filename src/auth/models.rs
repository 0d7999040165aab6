//! Authentication Models
//! Mission: Define users, session records and the two token claim shapes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    /// Rotating secret. Changing it invalidates every refresh token issued
    /// against the old value.
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One currently honored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthRecord {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

/// Which of the two token shapes a token claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Access token payload. Short lived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(rename = "sub")]
    pub user_id: Uuid,
    #[serde(rename = "sid")]
    pub session_id: Uuid,
    #[serde(rename = "kind")]
    pub token_kind: TokenKind,
    #[serde(rename = "exp")]
    pub expires_at: i64, // unix seconds
    #[serde(rename = "iss")]
    pub issuer: String,
}

/// Refresh token payload. No expiry: refresh tokens are revoked, not timed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    #[serde(rename = "sub")]
    pub user_id: Uuid,
    #[serde(rename = "sid")]
    pub session_id: Uuid,
    #[serde(rename = "ckey")]
    pub custom_key: String,
    #[serde(rename = "kind")]
    pub token_kind: TokenKind,
    #[serde(rename = "iss")]
    pub issuer: String,
}

/// Identity proven by a valid access token. Handlers receive this value
/// explicitly instead of digging it out of request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

/// Tokens issued on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Username/password pair supplied on login or signup.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub username: String,
}

/// Password change request
#[derive(Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

impl std::fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordChange").finish_non_exhaustive()
    }
}

/// Refresh response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// User response (sanitized)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_kind_serialization() {
        let json = serde_json::to_string(&TokenKind::Access).unwrap();
        assert_eq!(json, r#""access""#);

        let kind: TokenKind = serde_json::from_str(r#""refresh""#).unwrap();
        assert_eq!(kind, TokenKind::Refresh);
    }

    #[test]
    fn test_user_secrets_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "u1".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            token_hash: "rotating-secret".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hash"));
        assert!(!json.contains("rotating-secret"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "u1".to_string(),
            password: "hunter22".to_string(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("u1"));
        assert!(!printed.contains("hunter22"));
    }

    #[test]
    fn test_refresh_claims_have_no_expiry() {
        let claims = RefreshTokenClaims {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            custom_key: "abc".to_string(),
            token_kind: TokenKind::Refresh,
            issuer: "test".to_string(),
        };
        let value = serde_json::to_value(&claims).unwrap();
        assert!(value.get("exp").is_none());
        assert_eq!(value["kind"], "refresh");
    }
}
