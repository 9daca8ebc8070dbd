use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

mod api;
mod box_scores;
mod config;
mod db;
mod games;

use api::AppState;
use box_scores::{BarstoolFeed, BoxScoreProvider};
use config::Config;
use db::{Database, GameStore};
use games::GameReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database: the one shared handle for every resolution
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    if config.clear_cache {
        let removed = db.clear_games().await?;
        info!("Cleared {} stored game(s)", removed);
    }

    let feed = BarstoolFeed::new(
        &config.feed_url,
        Duration::from_secs(config.upstream_timeout_secs),
    )?;
    info!("Upstream feed: {} ({})", feed.name(), config.feed_url);

    let reconciler = GameReconciler::new(
        Arc::new(db),
        Arc::new(feed),
        config.freshness(),
        config.fetch_policy(),
        config.max_concurrent_fetches,
    );
    let schedule = config.schedule();
    info!(
        "Serving {} game(s); freshness window {}s, at most {} concurrent fetch(es), {} retr(ies)",
        schedule.len(),
        reconciler.freshness().window().num_seconds(),
        config.max_concurrent_fetches,
        config.upstream_retries
    );

    let app = api::router(AppState {
        reconciler,
        schedule,
    });
    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
