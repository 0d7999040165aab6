//! User Storage
//! Mission: Store user accounts and their rotating token secrets in SQLite

use crate::auth::models::User;
use crate::auth::password::{hash_blocking, DEFAULT_COST};
use crate::database::SharedConnection;
use crate::error::{StoreError, UserWriteError};
use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Row};
use tracing::info;
use uuid::Uuid;

const TOKEN_HASH_ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-";
const TOKEN_HASH_LEN: usize = 15;

const STATUS_ACTIVE: i64 = 1;
const STATUS_DELETED: i64 = 2;

/// Read access to users, as needed by the session authenticator.
/// Deleted users are never returned.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<User, StoreError>;
    async fn find_by_id(&self, user_id: &Uuid) -> Result<User, StoreError>;
}

/// Fresh random rotating secret
pub fn generate_token_hash() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_HASH_LEN)
        .map(|_| TOKEN_HASH_ALPHABET[rng.gen_range(0..TOKEN_HASH_ALPHABET.len())] as char)
        .collect()
}

/// User storage with SQLite backend
#[derive(Clone)]
pub struct UserStore {
    conn: SharedConnection,
    bcrypt_cost: u32,
}

impl UserStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self {
            conn,
            bcrypt_cost: DEFAULT_COST,
        }
    }

    /// Override the bcrypt cost used for new passwords
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    /// Create a new user with a fresh rotating secret
    pub async fn create_user(&self, username: &str, password: &str) -> Result<User, UserWriteError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(UserWriteError::EmptyUsername);
        }

        let password_hash = hash_blocking(password.to_string(), self.bcrypt_cost)
            .await
            .map_err(UserWriteError::Hashing)?;
        let now = Utc::now().to_rfc3339();

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            token_hash: generate_token_hash(),
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO users (id, username, password_hash, tokenhash, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id.to_string(),
                user.username,
                user.password_hash,
                user.token_hash,
                STATUS_ACTIVE,
                user.created_at,
                user.updated_at,
            ],
        )?;

        info!("✅ Created user: {} ({})", user.username, user.id);

        Ok(user)
    }

    /// Replace the password. The rotating secret changes in the same write,
    /// so every refresh token issued under the old password stops working.
    pub async fn update_password(
        &self,
        user_id: &Uuid,
        new_password: &str,
    ) -> Result<(), UserWriteError> {
        let password_hash = hash_blocking(new_password.to_string(), self.bcrypt_cost)
            .await
            .map_err(UserWriteError::Hashing)?;

        let conn = self.conn.lock().await;
        let rows_affected = conn.execute(
            "UPDATE users SET password_hash = ?1, tokenhash = ?2, updated_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                password_hash,
                generate_token_hash(),
                Utc::now().to_rfc3339(),
                user_id.to_string(),
                STATUS_ACTIVE
            ],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound.into());
        }

        info!("🔑 Password changed for user {}", user_id);
        Ok(())
    }

    /// Replace the user's rotating secret. Every refresh token issued before
    /// this call stops working; access tokens run out on their own.
    pub async fn rotate_token_hash(&self, user_id: &Uuid) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let rows_affected = conn.execute(
            "UPDATE users SET tokenhash = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            params![
                generate_token_hash(),
                Utc::now().to_rfc3339(),
                user_id.to_string(),
                STATUS_ACTIVE
            ],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        info!("🔄 Rotated token secret for user {}", user_id);
        Ok(())
    }

    /// Soft-delete a user and drop all of their sessions in one transaction.
    /// The row stays, so the username remains taken.
    pub async fn delete_user(&self, user_id: &Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let rows_affected = tx.execute(
            "UPDATE users SET status = ?1, deleted_at = ?2, updated_at = ?2, tokenhash = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                STATUS_DELETED,
                now,
                generate_token_hash(),
                user_id.to_string(),
                STATUS_ACTIVE
            ],
        )?;
        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        let sessions = tx.execute(
            "DELETE FROM auth WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        tx.commit()?;

        info!("🗑️  Deleted user {} ({} sessions revoked)", user_id, sessions);
        Ok(())
    }

    /// List active users
    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, username, password_hash, tokenhash, created_at, updated_at
             FROM users WHERE status = ?1 ORDER BY created_at",
        )?;

        let users = stmt
            .query_map(params![STATUS_ACTIVE], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }
}

#[async_trait::async_trait]
impl UserRepository for UserStore {
    async fn find_by_username(&self, username: &str) -> Result<User, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, username, password_hash, tokenhash, created_at, updated_at
             FROM users WHERE username = ?1 AND status = ?2",
        )?;
        let user = stmt.query_row(params![username, STATUS_ACTIVE], user_from_row)?;
        Ok(user)
    }

    async fn find_by_id(&self, user_id: &Uuid) -> Result<User, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, username, password_hash, tokenhash, created_at, updated_at
             FROM users WHERE id = ?1 AND status = ?2",
        )?;
        let user = stmt.query_row(params![user_id.to_string(), STATUS_ACTIVE], user_from_row)?;
        Ok(user)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(User {
        id,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        token_hash: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
