//! Error Types
//! Mission: Keep the client-visible failure surface to three kinds

use thiserror::Error;

/// Errors returned by the session authenticator to its callers.
///
/// `AuthenticationFailed` carries no detail: expired, revoked,
/// badly signed and wrong-kind tokens all look the same from outside. The
/// internal reason is logged where the check fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("auth store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Why a token was rejected. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    Signature,
    Algorithm,
    Expired,
    WrongKind,
    Issuer,
}

impl TokenRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenRejection::Malformed => "malformed",
            TokenRejection::Signature => "bad_signature",
            TokenRejection::Algorithm => "unexpected_algorithm",
            TokenRejection::Expired => "expired",
            TokenRejection::WrongKind => "wrong_token_kind",
            TokenRejection::Issuer => "wrong_issuer",
        }
    }
}

impl std::fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token codec failures. Key problems are kept apart from token problems.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing key configuration: {0}")]
    Configuration(String),
    #[error("invalid token: {0}")]
    Invalid(TokenRejection),
}

/// Persistence failures for auth records and users.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Failures when creating a user or replacing a password.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserWriteError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("username already exists")]
    Duplicate,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for UserWriteError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                UserWriteError::Duplicate
            }
            other => UserWriteError::Store(other.into()),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Configuration(msg) => AuthError::Configuration(msg),
            TokenError::Invalid(_) => AuthError::AuthenticationFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_collapse_to_authentication_failed() {
        for rejection in [
            TokenRejection::Malformed,
            TokenRejection::Signature,
            TokenRejection::Algorithm,
            TokenRejection::Expired,
            TokenRejection::WrongKind,
            TokenRejection::Issuer,
        ] {
            let err: AuthError = TokenError::Invalid(rejection).into();
            assert_eq!(err, AuthError::AuthenticationFailed);
            assert_eq!(err.to_string(), "authentication failed");
        }
    }

    #[test]
    fn test_key_problems_stay_configuration_errors() {
        let err: AuthError = TokenError::Configuration("bad pem".to_string()).into();
        assert!(matches!(err, AuthError::Configuration(ref m) if m == "bad pem"));
    }

    #[test]
    fn test_no_rows_maps_to_not_found() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err, StoreError::NotFound);

        let err: StoreError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_constraint_violation_is_duplicate() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();

        let err: UserWriteError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert_eq!(err, UserWriteError::Duplicate);

        let err: UserWriteError = conn
            .execute("INSERT INTO missing VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, UserWriteError::Store(StoreError::Unavailable(_))));
    }
}
