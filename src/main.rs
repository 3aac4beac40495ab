//! Co-op Governance API
//!
//! Members open proposals, cast one vote each, and read live tallies.
//! Closing a proposal freezes its votes and settles the outcome.

mod auth;
mod config;
mod error;
mod governance;
mod models;
mod routes;
mod state;
mod storage;

use crate::config::{RosterSource, Settings, StorageBackend};
use crate::governance::{FixedRoster, MemberRoster, RosterProvider};
use crate::routes::create_router;
use crate::state::AppState;
use crate::storage::{GovernanceStore, MemoryStore, PgStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting Co-op Governance API...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    if settings.auth.trust_user_header {
        warn!("⚠️  TRUST_USER_HEADER is on: X-User-Id is accepted without verification");
    }

    let (store, roster) = init_storage(&settings).await?;
    info!("✅ Storage ready (backend: {})", store.backend());

    let state = Arc::new(AppState::new(store, roster, &settings));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   GET  /health                                  - Liveness and storage check");
    info!("");
    info!("   ─── Proposals ───");
    info!("   GET  /api/proposals                           - List proposals, newest first");
    info!("   POST /api/proposals                           - Open a proposal");
    info!("   GET  /api/proposals/{{id}}                      - Get one proposal");
    info!("   POST /api/proposals/{{id}}/close                - Close voting");
    info!("");
    info!("   ─── Votes ───");
    info!("   GET  /api/proposals/{{id}}/votes                - List votes (?limit=&offset=)");
    info!("   POST /api/proposals/{{id}}/votes                - Cast your vote");
    info!("   PUT  /api/proposals/{{id}}/votes                - Change your vote");
    info!("   GET  /api/proposals/{{id}}/votes/me             - Your vote");
    info!("   GET  /api/proposals/{{id}}/votes/tally          - Live tally");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,coop_governance=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Pick the store and roster named by the settings
async fn init_storage(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn GovernanceStore>, Arc<dyn RosterProvider>)> {
    let governance = &settings.governance;

    match governance.storage {
        StorageBackend::Postgres => {
            let pg = PgStore::connect(&settings.database).await?;
            pg.migrate().await?;

            let roster: Arc<dyn RosterProvider> = match governance.roster {
                RosterSource::Fixed => Arc::new(FixedRoster(governance.eligible_members)),
                RosterSource::Members => Arc::new(MemberRoster::new(pg.pool().clone())),
            };
            Ok((Arc::new(pg), roster))
        }
        StorageBackend::Memory => {
            if governance.roster == RosterSource::Members {
                anyhow::bail!("ROSTER_SOURCE=members requires STORAGE_BACKEND=postgres");
            }
            warn!("⚠️  Using in-memory storage: data is lost on restart");
            Ok((
                Arc::new(MemoryStore::new()),
                Arc::new(FixedRoster(governance.eligible_members)),
            ))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
