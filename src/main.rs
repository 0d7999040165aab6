//! Session Auth - Two-token session authentication service
//! Mission: Short-lived access tokens, revocable refresh tokens, one
//! durable record per live session

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use session_auth_backend::{
    app,
    auth::{AppState, SessionAuthenticator, SqliteAuthRecordStore, UserRepository, UserStore},
    config::{load_env, AuthConfig},
    database::{self, SharedConnection},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "session-auth")]
#[command(about = "Two-token session authentication service")]
struct Cli {
    #[command(flatten)]
    config: AuthConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// Create a user account
    CreateUser {
        #[arg(long)]
        username: String,

        #[arg(long, env = "NEW_USER_PASSWORD")]
        password: String,
    },

    /// Replace a user's rotating secret; all of their refresh tokens stop working
    RotateSecret {
        #[arg(long)]
        username: String,
    },

    /// Soft-delete a user and revoke every session they hold
    DeleteUser {
        #[arg(long)]
        username: String,
    },

    /// Print active users and the live session count
    ListUsers,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();

    // One connection for the whole process, shared by both stores.
    let conn = database::open(&cli.config.auth_db_path)?;
    let user_store = UserStore::new(conn.clone());

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cli.config, conn, user_store).await,
        Commands::CreateUser { username, password } => {
            let user = user_store.create_user(&username, &password).await?;
            println!("{}", user.id);
            Ok(())
        }
        Commands::RotateSecret { username } => {
            let user = user_store
                .find_by_username(&username)
                .await
                .with_context(|| format!("Unknown user: {username}"))?;
            user_store
                .rotate_token_hash(&user.id)
                .await
                .context("Failed to rotate token secret")?;
            Ok(())
        }
        Commands::DeleteUser { username } => {
            let user = user_store
                .find_by_username(&username)
                .await
                .with_context(|| format!("Unknown user: {username}"))?;
            user_store
                .delete_user(&user.id)
                .await
                .context("Failed to delete user")?;
            Ok(())
        }
        Commands::ListUsers => {
            let users = user_store.list_users().await.context("Failed to list users")?;
            for user in &users {
                println!("{}\t{}\t{}", user.id, user.username, user.created_at);
            }
            let sessions = SqliteAuthRecordStore::new(conn)
                .len()
                .await
                .context("Failed to count sessions")?;
            println!("{} users, {} live sessions", users.len(), sessions);
            Ok(())
        }
    }
}

async fn serve(config: &AuthConfig, conn: SharedConnection, user_store: UserStore) -> Result<()> {
    let codec = config
        .token_codec()
        .context("Failed to load token signing keys")?;

    let authenticator = SessionAuthenticator::new(
        Arc::new(SqliteAuthRecordStore::new(conn)),
        Arc::new(user_store.clone()),
        Arc::new(codec),
    )
    .with_access_expiry_minutes(config.jwt_expiration)
    .with_store_timeout(config.store_timeout())
    .with_password_cost(user_store.bcrypt_cost());

    let app = app(AppState {
        authenticator,
        user_store,
    });

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🎯 Auth server listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("👋 Auth server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("🛑 Shutdown signal received");
}

/// Initialize tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_auth_backend=debug,session_auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
