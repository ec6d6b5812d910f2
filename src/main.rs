//! TeddyCloud PCM preparation server
//!
//! Accepts ordered audio uploads, converts every file to 48 kHz interleaved
//! stereo PCM16 with the teddy-pcm pipeline, and serves the prepared parts
//! for the TAF encoder.

mod config;
mod config_file;
mod error;
mod http;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::http::create_router;
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "teddy-pcm-server";

/// Interval of the expired batch sweep
const EVICTION_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let first = args.next();
    if first.as_deref() == Some("--generate-config") {
        let path = args.next().unwrap_or_else(|| "config.toml".to_string());
        crate::config_file::generate_default_config(&path)?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    // Load configuration
    let config_path = first.unwrap_or_else(|| "config.toml".to_string());
    let (config, config_error) = match crate::config_file::load(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (ServerConfig::default(), Some(e)),
    };

    init_logging(&config);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    if let Some(e) = config_error {
        tracing::warn!(
            "Failed to load config file {}: {}. Using defaults.",
            config_path,
            e
        );
    }
    tracing::info!("Configuration loaded: {:?}", config);

    // Initialize FFmpeg and install log filter
    match teddy_pcm::init() {
        Ok(()) => {
            teddy_pcm::install_log_filter();
            tracing::info!("FFmpeg version: {}", teddy_pcm::ffmpeg_version_info());
        }
        Err(e) => tracing::error!("FFmpeg initialization failed: {}", e),
    }

    // Create application state
    let state = Arc::new(AppState::new(config.clone()));

    // Background task: evict expired batches.
    {
        let state_bg = Arc::clone(&state);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(EVICTION_INTERVAL_SECS));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if state_bg.is_shutdown() {
                    break;
                }
                let removed = state_bg.cleanup_expired_batches();
                if removed > 0 {
                    tracing::info!("Evicted {} expired batch(es)", removed);
                }
            }
        });
    }

    // Build router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| ServerError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&state)))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C and flag the state as shutting down
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
    state.shutdown();
}

/// Initialize logging with tracing
fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "teddy_pcm={level},teddy_pcm_server={level},tower_http=debug",
            level = default_level(&config.log_level)
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Crate log level for a configured level name; unknown names mean debug
fn default_level(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "debug",
    }
}
