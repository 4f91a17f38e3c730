//! # courier-server
//!
//! Real-time messaging relay.
//!
//! This binary provides:
//! - **Session registry** mapping each user to the one connection that
//!   currently speaks for them (last join wins)
//! - **Message relay** that persists every chat message before pushing the
//!   stored record to the sender and, if online, the receiver
//! - **Call signaling** that forwards WebRTC offers, answers, ICE
//!   candidates and hangups between users; media itself flows peer-to-peer
//! - **WebSocket transport** (axum) plus `/health` and `/info`
//! - **Per-IP rate limiting** on the HTTP surface

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use courier_server::api::{self, AppState};
use courier_server::config::ServerConfig;
use courier_server::hub::Hub;
use courier_server::rate_limit::RateLimiter;
use courier_server::store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,courier_server=debug")),
        )
        .init();

    info!("Starting Courier relay v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    let hub = Arc::new(Hub::new(store, config.store_timeout));
    let rate_limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst);

    let app_state = AppState {
        hub,
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Evict rate-limit buckets idle for more than 10 minutes, every 5 minutes.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(Duration::from_secs(600));
        }
    });

    // -----------------------------------------------------------------------
    // 5. Serve until shutdown
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
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
