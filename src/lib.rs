//! Session Auth Backend Library
//!
//! Two-token (access + refresh) session authentication over RS256 JWTs,
//! with revocable auth records and a per-user rotating refresh secret.
//! Exposes the core modules for the binary and integration tests.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::AuthError;

/// Auth routes wrapped in the shared HTTP layers.
pub fn app(state: auth::AppState) -> Router {
    auth::router(state)
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
