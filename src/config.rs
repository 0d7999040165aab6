//! Process Configuration
//! Mission: Gather key paths, token lifetimes and storage settings from
//! flags, the environment and `.env`

use crate::auth::jwt::{KeyPair, TokenCodec};
use crate::error::TokenError;
use clap::Parser;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::error;

/// Longest accepted access token lifetime: one week.
pub const MAX_ACCESS_EXPIRY_MINUTES: i64 = 7 * 24 * 60;

#[derive(Parser, Debug, Clone)]
pub struct AuthConfig {
    /// PEM private key used to sign access tokens
    #[arg(
        long,
        env = "ACCESS_TOKEN_PRIVATE_KEY_PATH",
        default_value = "./keys/access-private.pem"
    )]
    pub access_private_key: PathBuf,

    /// PEM public key used to verify access tokens
    #[arg(
        long,
        env = "ACCESS_TOKEN_PUBLIC_KEY_PATH",
        default_value = "./keys/access-public.pem"
    )]
    pub access_public_key: PathBuf,

    /// PEM private key used to sign refresh tokens
    #[arg(
        long,
        env = "REFRESH_TOKEN_PRIVATE_KEY_PATH",
        default_value = "./keys/refresh-private.pem"
    )]
    pub refresh_private_key: PathBuf,

    /// PEM public key used to verify refresh tokens
    #[arg(
        long,
        env = "REFRESH_TOKEN_PUBLIC_KEY_PATH",
        default_value = "./keys/refresh-public.pem"
    )]
    pub refresh_public_key: PathBuf,

    /// Access token lifetime in minutes
    #[arg(
        long,
        env = "JWT_EXPIRATION",
        default_value = "30",
        value_parser = clap::value_parser!(i64).range(1..=MAX_ACCESS_EXPIRY_MINUTES)
    )]
    pub jwt_expiration: i64,

    /// `iss` claim written to and required on every token
    #[arg(long, env = "JWT_ISSUER", default_value = "session-auth.service")]
    pub issuer: String,

    /// SQLite database holding users and auth records
    #[arg(long, env = "AUTH_DB_PATH", default_value = "session_auth.db")]
    pub auth_db_path: String,

    /// Upper bound on a single auth store call
    #[arg(long, env = "AUTH_STORE_TIMEOUT_MS", default_value = "2000")]
    pub store_timeout_ms: u64,

    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,
}

impl AuthConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Load both key pairs. Any unreadable or mismatched key aborts startup.
    pub fn token_codec(&self) -> Result<TokenCodec, TokenError> {
        let access = load_pair("access", &self.access_private_key, &self.access_public_key)?;
        let refresh = load_pair("refresh", &self.refresh_private_key, &self.refresh_public_key)?;
        Ok(TokenCodec::new(access, refresh, self.issuer.clone()))
    }
}

fn load_pair(kind: &str, private: &Path, public: &Path) -> Result<KeyPair, TokenError> {
    KeyPair::from_pem_files(private, public).map_err(|e| {
        error!(kind, error = %e, "Token key pair rejected");
        e
    })
}

/// Read `.env` from the working directory (or a parent) and from the crate root.
pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/keys")
            .join(name)
            .to_string_lossy()
            .to_string()
    }

    fn fixture_config() -> AuthConfig {
        AuthConfig::try_parse_from([
            "session-auth",
            "--access-private-key",
            fixture("access-private.pem").as_str(),
            "--access-public-key",
            fixture("access-public.pem").as_str(),
            "--refresh-private-key",
            fixture("refresh-private.pem").as_str(),
            "--refresh-public-key",
            fixture("refresh-public.pem").as_str(),
            "--issuer",
            "config-test",
            "--store-timeout-ms",
            "250",
        ])
        .unwrap()
    }

    #[test]
    fn test_flags_parse() {
        let config = fixture_config();
        assert_eq!(config.issuer, "config-test");
        assert_eq!(config.store_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_access_expiry_is_bounded() {
        let parse = |minutes: &str| {
            AuthConfig::try_parse_from(["session-auth".to_string(), format!("--jwt-expiration={minutes}")])
        };

        assert_eq!(parse("30").unwrap().jwt_expiration, 30);
        assert_eq!(
            parse("10080").unwrap().jwt_expiration,
            MAX_ACCESS_EXPIRY_MINUTES
        );
        assert!(parse("0").is_err());
        assert!(parse("-5").is_err());
        assert!(parse("10081").is_err());
        assert!(parse("4611686018427387903").is_err());
    }

    #[test]
    fn test_token_codec_from_fixture_keys() {
        let codec = fixture_config().token_codec().unwrap();
        assert_eq!(codec.issuer(), "config-test");
    }

    #[test]
    fn test_missing_key_aborts() {
        let mut config = fixture_config();
        config.refresh_public_key = PathBuf::from("/nonexistent/refresh-public.pem");

        match config.token_codec() {
            Err(TokenError::Configuration(msg)) => assert!(msg.contains("refresh-public.pem")),
            Err(other) => panic!("expected configuration error, got {other}"),
            Ok(_) => panic!("expected configuration error, got a codec"),
        }
    }
}
