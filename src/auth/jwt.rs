//! JWT Token Codec
//! Mission: Sign and verify access and refresh tokens with RS256 key pairs

use crate::auth::models::{AccessTokenClaims, RefreshTokenClaims, TokenKind};
use crate::error::{TokenError, TokenRejection};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::{debug, error};
use uuid::Uuid;

const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Private key for minting, public key for verifying. One pair per token kind.
#[derive(Clone)]
pub struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    /// Parse PEM key material and check that the two halves belong together.
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, TokenError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| TokenError::Configuration(format!("unable to parse private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|e| TokenError::Configuration(format!("unable to parse public key: {e}")))?;

        let pair = Self { encoding, decoding };
        pair.check_matching()?;
        Ok(pair)
    }

    /// Read both halves from disk. Read failures are configuration errors.
    pub fn from_pem_files(private_path: &Path, public_path: &Path) -> Result<Self, TokenError> {
        let private_pem = std::fs::read(private_path).map_err(|e| {
            TokenError::Configuration(format!(
                "unable to read private key {}: {e}",
                private_path.display()
            ))
        })?;
        let public_pem = std::fs::read(public_path).map_err(|e| {
            TokenError::Configuration(format!(
                "unable to read public key {}: {e}",
                public_path.display()
            ))
        })?;
        Self::from_pem(&private_pem, &public_pem)
    }

    fn check_matching(&self) -> Result<(), TokenError> {
        let sample = serde_json::json!({ "key_check": true });
        let token = encode(&Header::new(SIGNING_ALGORITHM), &sample, &self.encoding)
            .map_err(|e| TokenError::Configuration(format!("unable to sign with private key: {e}")))?;

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        decode::<serde_json::Value>(&token, &self.decoding, &validation)
            .map(|_| ())
            .map_err(|_| {
                TokenError::Configuration("private and public keys do not match".to_string())
            })
    }
}

/// Token codec for both token kinds
#[derive(Clone)]
pub struct TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
}

impl TokenCodec {
    pub fn new(access: KeyPair, refresh: KeyPair, issuer: impl Into<String>) -> Self {
        Self {
            access,
            refresh,
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign an access token valid for `expiry_minutes` from now.
    pub fn encode_access(
        &self,
        user_id: &Uuid,
        session_id: &Uuid,
        expiry_minutes: i64,
    ) -> Result<String, TokenError> {
        let expires_at = chrono::Duration::try_minutes(expiry_minutes)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                error!(expiry_minutes, "Access token lifetime out of range");
                TokenError::Configuration(format!("invalid access expiry: {expiry_minutes}m"))
            })?
            .timestamp();

        let claims = AccessTokenClaims {
            user_id: *user_id,
            session_id: *session_id,
            token_kind: TokenKind::Access,
            expires_at,
            issuer: self.issuer.clone(),
        };

        debug!(%user_id, %session_id, expires_at, "Signing access token");
        self.sign(&claims, &self.access)
    }

    /// Sign a refresh token carrying the caller-derived custom key.
    pub fn encode_refresh(
        &self,
        user_id: &Uuid,
        session_id: &Uuid,
        custom_key: &str,
    ) -> Result<String, TokenError> {
        let claims = RefreshTokenClaims {
            user_id: *user_id,
            session_id: *session_id,
            custom_key: custom_key.to_string(),
            token_kind: TokenKind::Refresh,
            issuer: self.issuer.clone(),
        };

        debug!(%user_id, %session_id, "Signing refresh token");
        self.sign(&claims, &self.refresh)
    }

    pub fn decode_access(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let mut validation = self.validation();
        validation.set_required_spec_claims(&["exp", "iss"]);

        let claims: AccessTokenClaims =
            self.verify(token, &self.access, &validation, TokenKind::Access)?;
        expect_kind(claims.token_kind, TokenKind::Access)?;
        Ok(claims)
    }

    pub fn decode_refresh(&self, token: &str) -> Result<RefreshTokenClaims, TokenError> {
        let mut validation = self.validation();
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["iss"]);

        let claims: RefreshTokenClaims =
            self.verify(token, &self.refresh, &validation, TokenKind::Refresh)?;
        expect_kind(claims.token_kind, TokenKind::Refresh)?;
        Ok(claims)
    }

    fn validation(&self) -> Validation {
        // Only RS256 is accepted; a token whose header names anything else
        // (HS256 keyed with the public key, "none", ...) is rejected.
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation
    }

    fn sign<T: Serialize>(&self, claims: &T, keys: &KeyPair) -> Result<String, TokenError> {
        encode(&Header::new(SIGNING_ALGORITHM), claims, &keys.encoding).map_err(|e| {
            error!(error = %e, "Unable to sign token");
            TokenError::Configuration(format!("unable to sign token: {e}"))
        })
    }

    fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
        keys: &KeyPair,
        validation: &Validation,
        kind: TokenKind,
    ) -> Result<T, TokenError> {
        decode::<T>(token, &keys.decoding, validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let rejection = classify(e.kind());
                debug!(kind = kind.as_str(), reason = %rejection, "Token rejected");
                TokenError::Invalid(rejection)
            })
    }
}

fn expect_kind(actual: TokenKind, expected: TokenKind) -> Result<(), TokenError> {
    if actual != expected {
        debug!(
            expected = expected.as_str(),
            actual = actual.as_str(),
            reason = %TokenRejection::WrongKind,
            "Token rejected"
        );
        return Err(TokenError::Invalid(TokenRejection::WrongKind));
    }
    Ok(())
}

fn classify(kind: &ErrorKind) -> TokenRejection {
    match kind {
        ErrorKind::InvalidSignature => TokenRejection::Signature,
        ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm => TokenRejection::Algorithm,
        ErrorKind::ExpiredSignature => TokenRejection::Expired,
        ErrorKind::InvalidIssuer => TokenRejection::Issuer,
        _ => TokenRejection::Malformed,
    }
}
