//! Authentication Module
//! Mission: Two-token sessions with revocable auth records

pub mod api;
pub mod auth_store;
pub mod custom_key;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod session;
pub mod user_store;

pub use api::router;
pub use auth_store::{AuthRecordStore, MemoryAuthRecordStore, SqliteAuthRecordStore};
pub use jwt::{KeyPair, TokenCodec};
pub use middleware::{AppState, Authenticated};
pub use session::SessionAuthenticator;
pub use user_store::{UserRepository, UserStore};
