//! # chatterbox-server
//!
//! Web front end for the Chatterbox assistant.
//!
//! This binary provides:
//! - **Accounts** with Argon2id password hashes and server-side sessions
//! - **Remembered logins** through a sealed, expiring cookie
//! - **Chat routes** that run each message through the responder and keep
//!   per-user conversation history in SQLite
//! - **Teach endpoint** that grows the knowledge base at runtime
//! - **Per-IP rate limiting** on the chat routes

mod api;
mod auth;
mod config;
mod error;
mod pages;
mod rate_limit;
mod session;

use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chatterbox_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Environment and tracing (RUST_LOG wins over the default filter)
    // -----------------------------------------------------------------------
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chatterbox_server=debug")),
        )
        .init();

    info!("Starting Chatterbox v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = &dotenv {
        info!(path = %path.display(), "Loaded .env");
    }

    // -----------------------------------------------------------------------
    // 2. Configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.session_secret_generated {
        warn!("SESSION_SECRET is not set; remembered logins will not survive a restart");
    }

    // -----------------------------------------------------------------------
    // 3. Storage: create the database and run migrations once up front
    // -----------------------------------------------------------------------
    let db_path = config.database_path.clone();
    tokio::task::spawn_blocking(move || Database::open_at(&db_path)).await??;
    info!(path = %config.database_path.display(), "Database ready");

    let http_addr = config.http_addr;
    let seed_path = config.knowledge_seed_path.clone();
    let state = AppState::new(config);

    if let Some(seed) = seed_path {
        if let Err(e) = state.responder.knowledge().seed_from_file(&seed).await {
            warn!(path = %seed.display(), error = %e, "Could not seed knowledge base");
        }
    }

    // -----------------------------------------------------------------------
    // 4. Background housekeeping
    // -----------------------------------------------------------------------

    // Rate limiter: every 5 minutes, forget clients idle for 10
    let rl = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(Duration::from_secs(600)).await;
        }
    });

    // Sessions: every minute, drop the idle ones
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            sessions.sweep().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. HTTP server until it fails or Ctrl+C arrives
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
