//! forum-server - anonymous discussion forum backend
//!
//! REST API behind a cookie session gate, plus the background archival
//! sweeper and identity reclaimer.

use forum_core::client::{CharacterIdentityProvider, HttpImageStore, IdentityPoolConfig};
use forum_core::{Clock, Database, SystemClock};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod error;
mod middleware;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod testing;

use services::ArchivalSweeper;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("forum-server v{}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load()?;
    info!(addr = %config.addr, database = %config.database_path.display(), "Config loaded");

    let db = Database::open_path(&config.database_path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let identity = Arc::new(CharacterIdentityProvider::new(
        IdentityPoolConfig {
            base_url: config.identity_url.clone(),
            pool_size: config.identity_pool_size,
        },
        Arc::clone(&clock),
    )?);
    let images = Arc::new(HttpImageStore::new(
        &config.storage_url,
        config.storage_code_length,
    )?);

    let sweep_interval = config.sweep_interval();
    let reclaim_interval = config.identity_reclaim_interval();
    let addr = config.addr.clone();

    let state = AppState::new(config, db, Arc::clone(&clock), identity.clone(), images);

    let shutdown = CancellationToken::new();
    let sweeper = ArchivalSweeper::new(state.posts.clone(), Arc::clone(&clock), sweep_interval)
        .start(shutdown.clone());
    let reclaimer = identity.spawn_reclaimer(reclaim_interval, shutdown.clone());

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    shutdown.cancel();
    sweeper.await?;
    reclaimer.await?;

    Ok(())
}

/// Plain text logs by default, JSON lines when `FORUM_LOG_FORMAT=json`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("forum_server=info,forum_core=info"));
    let json = std::env::var("FORUM_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
