//! Engine binary for Chronicle.
//!
//! Loads configuration, constructs the runtime, and serves the observer
//! API until `Ctrl-C`. Simulations are driven through the API; the
//! engine itself runs no phases.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `chronicle-config.yaml` (or the path in
//!    `CHRONICLE_CONFIG`), then apply environment overrides
//! 2. Initialize structured logging (tracing), pretty or JSON
//! 3. Initialize the runtime: store backend, optional gateway, scenarios
//! 4. Serve the observer API
//! 5. On `Ctrl-C`: close notification queues, drain the server, flush
//!    the store

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use chronicle_core::{ChronicleConfig, LogFormat, Runtime};
use chronicle_observer::{AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "chronicle-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, runtime construction, the observer
/// server, or the final store flush fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config);
    info!(
        store_backend = ?config.store.backend,
        observer_port = config.observer.port,
        queue_capacity = config.notifications.queue_capacity,
        "chronicle-engine starting"
    );

    // 3. Initialize the runtime.
    let runtime = Arc::new(Runtime::initialize(config.clone()).await?);
    info!(
        store = runtime.store().backend_name(),
        gateway = runtime.coordinator().gateway().is_some(),
        "Runtime initialized"
    );

    // 4. Serve the observer API until Ctrl-C.
    let server_config = ServerConfig {
        host: config.observer.host.clone(),
        port: config.observer.port,
    };
    let state = Arc::new(AppState::new(Arc::clone(&runtime)));
    let signal_runtime = Arc::clone(&runtime);
    let served = chronicle_observer::start_server(&server_config, state, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
        }
        info!("Shutdown requested");
        // Ends open event streams so the server can drain.
        signal_runtime.hub().close_all();
    })
    .await;

    // 5. Flush the store even when the server failed.
    runtime.shutdown().await?;
    served?;

    info!("chronicle-engine shutdown complete");
    Ok(())
}

/// Load configuration from `CHRONICLE_CONFIG` or `chronicle-config.yaml`,
/// falling back to defaults when the file does not exist.
fn load_config() -> Result<ChronicleConfig, EngineError> {
    let config_path = std::env::var("CHRONICLE_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        return Ok(ChronicleConfig::from_file(&config_path)?);
    }
    let mut config = ChronicleConfig::default();
    config.apply_env_overrides();
    Ok(config)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(config: &ChronicleConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}
