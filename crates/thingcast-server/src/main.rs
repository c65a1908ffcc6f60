//! Thingcast server binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `thingcast-config.yaml` (or `THINGCAST_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect the snapshot store and broadcaster
//! 4. Start the embedded mutator, if enabled
//! 5. Serve HTTP + `WebSocket` until `Ctrl-C`
//! 6. Stop the mutator and close the backends

use thingcast_core::{ServiceConfig, logging};
use tracing::info;

/// Application entry point for the Thingcast server.
///
/// # Errors
///
/// Returns an error if configuration, startup, serving, or teardown fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // 1. Load configuration.
    let config = ServiceConfig::load()?;

    // 2. Initialize structured logging.
    logging::init(&config.logging)?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        backend = ?config.backend.kind,
        embedded_mutator = config.mutator.embedded,
        "thingcast starting"
    );

    // 3-6. Run until Ctrl-C.
    thingcast_server::startup::run(&config).await?;

    info!("thingcast stopped");
    Ok(())
}
