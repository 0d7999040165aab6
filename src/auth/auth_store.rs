//! Auth Record Storage
//! Mission: Durable source of truth for which sessions are still alive

use crate::auth::models::AuthRecord;
use crate::database::SharedConnection;
use crate::error::StoreError;
use parking_lot::RwLock;
use rusqlite::params;
use std::{collections::HashSet, sync::Arc};
use tracing::debug;
use uuid::Uuid;

/// Session record persistence.
///
/// Implementations own their concurrency; callers issue one logical read or
/// write per call and never hold anything across calls.
#[async_trait::async_trait]
pub trait AuthRecordStore: Send + Sync {
    /// Exact-match lookup.
    async fn fetch(&self, user_id: &Uuid, session_id: &Uuid) -> Result<AuthRecord, StoreError>;

    /// Insert unless the same record already exists.
    async fn create(&self, user_id: &Uuid, session_id: &Uuid) -> Result<AuthRecord, StoreError>;

    /// Remove one record. Removing an absent record reports `NotFound`,
    /// which callers treat as success.
    async fn delete(&self, user_id: &Uuid, session_id: &Uuid) -> Result<(), StoreError>;
}

/// SQLite-backed auth records
#[derive(Clone)]
pub struct SqliteAuthRecordStore {
    conn: SharedConnection,
}

impl SqliteAuthRecordStore {
    /// Wrap an already opened database (see `database::open`)
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Number of live sessions, all users
    pub async fn len(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM auth", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait::async_trait]
impl AuthRecordStore for SqliteAuthRecordStore {
    async fn fetch(&self, user_id: &Uuid, session_id: &Uuid) -> Result<AuthRecord, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT 1 FROM auth WHERE user_id = ?1 AND auth_uuid = ?2 LIMIT 1",
        )?;
        let found = stmt.exists(params![user_id.to_string(), session_id.to_string()])?;

        if !found {
            return Err(StoreError::NotFound);
        }
        Ok(AuthRecord {
            user_id: *user_id,
            session_id: *session_id,
        })
    }

    async fn create(&self, user_id: &Uuid, session_id: &Uuid) -> Result<AuthRecord, StoreError> {
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO auth (user_id, auth_uuid, created_at) VALUES (?1, ?2, ?3)",
            params![
                user_id.to_string(),
                session_id.to_string(),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            debug!(%user_id, %session_id, "Auth record already present");
        }
        Ok(AuthRecord {
            user_id: *user_id,
            session_id: *session_id,
        })
    }

    async fn delete(&self, user_id: &Uuid, session_id: &Uuid) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let rows_affected = conn.execute(
            "DELETE FROM auth WHERE user_id = ?1 AND auth_uuid = ?2",
            params![user_id.to_string(), session_id.to_string()],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Process-local auth records. Lost on restart; useful for single-node
/// deployments and tests.
#[derive(Clone, Default)]
pub struct MemoryAuthRecordStore {
    records: Arc<RwLock<HashSet<AuthRecord>>>,
}

impl MemoryAuthRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait::async_trait]
impl AuthRecordStore for MemoryAuthRecordStore {
    async fn fetch(&self, user_id: &Uuid, session_id: &Uuid) -> Result<AuthRecord, StoreError> {
        let record = AuthRecord {
            user_id: *user_id,
            session_id: *session_id,
        };
        if self.records.read().contains(&record) {
            Ok(record)
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn create(&self, user_id: &Uuid, session_id: &Uuid) -> Result<AuthRecord, StoreError> {
        let record = AuthRecord {
            user_id: *user_id,
            session_id: *session_id,
        };
        self.records.write().insert(record);
        Ok(record)
    }

    async fn delete(&self, user_id: &Uuid, session_id: &Uuid) -> Result<(), StoreError> {
        let record = AuthRecord {
            user_id: *user_id,
            session_id: *session_id,
        };
        if self.records.write().remove(&record) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (SqliteAuthRecordStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = SqliteAuthRecordStore::new(database::open(db_path).unwrap());
        (store, temp_file)
    }

    async fn exercise_contract(store: &dyn AuthRecordStore) {
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        // Nothing yet
        assert_eq!(
            store.fetch(&user_id, &session_id).await,
            Err(StoreError::NotFound)
        );

        // Create, then fetch
        let record = store.create(&user_id, &session_id).await.unwrap();
        assert_eq!(record.user_id, user_id);
        assert_eq!(record.session_id, session_id);
        assert_eq!(store.fetch(&user_id, &session_id).await, Ok(record));

        // Creating again is a no-op
        assert_eq!(store.create(&user_id, &session_id).await, Ok(record));

        // Exact match only
        assert_eq!(
            store.fetch(&Uuid::new_v4(), &session_id).await,
            Err(StoreError::NotFound)
        );

        // Delete, then delete again
        assert_eq!(store.delete(&user_id, &session_id).await, Ok(()));
        assert_eq!(
            store.fetch(&user_id, &session_id).await,
            Err(StoreError::NotFound)
        );
        assert_eq!(
            store.delete(&user_id, &session_id).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_sqlite_store_contract() {
        let (store, _temp) = create_test_store();
        exercise_contract(&store).await;
    }

    #[tokio::test]
    async fn test_memory_store_contract() {
        let store = MemoryAuthRecordStore::new();
        exercise_contract(&store).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_create_does_not_duplicate() {
        let (store, _temp) = create_test_store();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        store.create(&user_id, &session_id).await.unwrap();
        store.create(&user_id, &session_id).await.unwrap();
        store.create(&user_id, &Uuid::new_v4()).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_records_survive_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        {
            let store = SqliteAuthRecordStore::new(database::open(db_path).unwrap());
            store.create(&user_id, &session_id).await.unwrap();
        }

        let reopened = SqliteAuthRecordStore::new(database::open(db_path).unwrap());
        assert!(reopened.fetch(&user_id, &session_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_sqlite_concurrent_sessions() {
        let (store, _temp) = create_test_store();
        let user_id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let session_id = Uuid::new_v4();
                store.create(&user_id, &session_id).await.unwrap();
                store.fetch(&user_id, &session_id).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await.unwrap(), 16);
    }
}
