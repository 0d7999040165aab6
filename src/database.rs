//! SQLite connection handle shared by the user and auth record stores.
//!
//! The entry point opens one connection, hands clones of the handle to each
//! store, and drops it on shutdown.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub type SharedConnection = Arc<Mutex<Connection>>;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    tokenhash TEXT NOT NULL,
    status INTEGER NOT NULL DEFAULT 1, -- 1 active, 2 deleted
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

-- One row per live session. Removed by logout or by deleting the user.
CREATE TABLE IF NOT EXISTS auth (
    user_id TEXT NOT NULL,
    auth_uuid TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, auth_uuid)
) WITHOUT ROWID;
"#;

/// Open (or create) the database file and apply the schema.
pub fn open(db_path: &str) -> Result<SharedConnection> {
    let conn = Connection::open(db_path).with_context(|| format!("open auth db {db_path}"))?;
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL").ok();
    conn.execute_batch(SCHEMA_SQL)
        .context("Failed to apply auth schema")?;

    info!("🔐 Auth database ready at: {}", db_path);
    Ok(Arc::new(Mutex::new(conn)))
}

/// Private in-memory database, mainly for tests.
pub fn open_in_memory() -> Result<SharedConnection> {
    let conn = Connection::open_in_memory().context("open in-memory auth db")?;
    conn.execute_batch(SCHEMA_SQL)
        .context("Failed to apply auth schema")?;
    Ok(Arc::new(Mutex::new(conn)))
}
