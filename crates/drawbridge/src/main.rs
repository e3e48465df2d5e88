//! # Moat Drawbridge - Fallback Verification Engine
//!
//! Sits in front of a Minecraft backend and holds new players in a
//! lightweight fake world until they prove they run a real client.
//!
//! ## Architecture
//! ```text
//! Client → Drawbridge ──(verified)──→ Backend
//!              ↓
//!        Redis (verified / blacklist)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod captcha;
mod config;
mod fallback;
mod gateway;
mod limits;
mod protocol;
mod routes;
mod state;
mod store;

use config::AppConfig;
use moat_common::constants::{PURGE_INTERVAL_SECS, tables};
use state::AppState;
use store::{AddressBackend, AddressStore, MemoryBackend, RedisBackend};

/// Moat Drawbridge - fallback verification engine
#[derive(Parser, Debug)]
#[command(name = "drawbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/drawbridge.toml")]
    config: String,

    /// Redis URL for persistent storage (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Game listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Backend server address (overrides config)
    #[arg(short, long, env = "BACKEND_ADDR")]
    backend: Option<String>,

    /// Admin HTTP address (overrides config)
    #[arg(long, env = "ADMIN_ADDR")]
    admin: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!(
        "🔥 Starting Moat Drawbridge v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Storage backend
    let backend: Arc<dyn AddressBackend> = match config.storage.redis_url {
        Some(ref url) => Arc::new(
            RedisBackend::connect(url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => Arc::new(MemoryBackend::new()),
    };
    backend
        .initialize()
        .await
        .with_context(|| format!("Failed to initialize {} storage", backend.name()))?;
    info!("💾 Storage ready: {}", backend.name());

    let (verified, verified_writer) = AddressStore::new(tables::VERIFIED, backend.clone());
    let (blacklist, blacklist_writer) = AddressStore::new(tables::BLACKLIST, backend.clone());
    let loaded = verified.load(backend.as_ref()).await.context("Failed to load verified addresses")?;
    let banned = blacklist.load(backend.as_ref()).await.context("Failed to load blacklist")?;
    info!(verified = loaded, blacklisted = banned, "💾 Address tables loaded");

    let writers = [
        tokio::spawn(verified_writer.run(shutdown_tx.subscribe())),
        tokio::spawn(blacklist_writer.run(shutdown_tx.subscribe())),
    ];

    // Initialize application state
    let state = AppState::new(config.clone(), Arc::new(verified), Arc::new(blacklist))?;

    // Background workers
    if config.captcha.enabled {
        tokio::spawn(captcha::captcha_pool_worker(
            state.captcha_pool.clone(),
            Duration::from_secs(config.captcha.refresh_secs),
            shutdown_tx.subscribe(),
        ));
    }
    tokio::spawn(limits::queue_worker(
        state.queue.clone(),
        Duration::from_millis(config.queue.poll_interval_ms),
        shutdown_tx.subscribe(),
    ));
    tokio::spawn(limits::rate_limit_worker(
        state.rate_limiter.clone(),
        Duration::from_secs(PURGE_INTERVAL_SECS),
        shutdown_tx.subscribe(),
    ));
    tokio::spawn(limits::deny_list_worker(
        state.deny_list.clone(),
        Duration::from_secs(PURGE_INTERVAL_SECS),
        shutdown_tx.subscribe(),
    ));

    // Game listener
    let game_listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!(
        "🚀 Drawbridge listening on {} (backend {})",
        config.listen_addr, config.backend_addr
    );
    let game = tokio::spawn(gateway::serve(
        game_listener,
        state.clone(),
        shutdown_tx.subscribe(),
    ));

    // Admin surface
    let app = routes::create_router(state);
    let admin_listener = tokio::net::TcpListener::bind(&config.admin_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.admin_addr))?;
    info!("🚀 Admin API listening on {}", config.admin_addr);

    // Handle graceful shutdown
    let signal_tx = shutdown_tx.clone();
    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("🛑 Shutdown signal received");
        let _ = signal_tx.send(());
    };

    axum::serve(admin_listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    let _ = game.await;
    for writer in writers {
        let _ = writer.await;
    }
    if let Err(e) = backend.dispose().await {
        tracing::warn!(error = %e, "Failed to close storage");
    }

    info!("👋 Drawbridge shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
