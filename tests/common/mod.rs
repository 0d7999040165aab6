//! Shared fixtures for integration tests

#![allow(dead_code)]

use session_auth_backend::{
    auth::{
        password::MIN_COST, AppState, KeyPair, SessionAuthenticator, SqliteAuthRecordStore,
        TokenCodec, UserStore,
    },
    database::{self, SharedConnection},
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const ISSUER: &str = "integration-test";

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("keys")
}

pub fn key_pair(prefix: &str) -> KeyPair {
    KeyPair::from_pem_files(
        &fixtures_dir().join(format!("{prefix}-private.pem")),
        &fixtures_dir().join(format!("{prefix}-public.pem")),
    )
    .unwrap()
}

pub fn codec() -> TokenCodec {
    TokenCodec::new(key_pair("access"), key_pair("refresh"), ISSUER)
}

/// Everything a test needs, wired the way the binary wires it.
pub struct Harness {
    pub authenticator: SessionAuthenticator,
    pub users: UserStore,
    pub records: SqliteAuthRecordStore,
    pub codec: Arc<TokenCodec>,
    pub conn: SharedConnection,
    _db: NamedTempFile,
}

impl Harness {
    pub fn new() -> Self {
        let db = NamedTempFile::new().unwrap();
        let conn = database::open(db.path().to_str().unwrap()).unwrap();

        let users = UserStore::new(conn.clone()).with_bcrypt_cost(MIN_COST);
        let records = SqliteAuthRecordStore::new(conn.clone());
        let codec = Arc::new(codec());

        let authenticator = SessionAuthenticator::new(
            Arc::new(records.clone()),
            Arc::new(users.clone()),
            codec.clone(),
        )
        .with_password_cost(MIN_COST);

        Self {
            authenticator,
            users,
            records,
            codec,
            conn,
            _db: db,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            authenticator: self.authenticator.clone(),
            user_store: self.users.clone(),
        }
    }
}
