//! Stand-alone mutator process for Thingcast.
//!
//! Runs the snapshot mutator against the shared Dragonfly store and NATS
//! broadcaster so any number of `thingcast` servers (started with
//! `mutator.embedded: false`) can serve the updates it publishes.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `thingcast-config.yaml` (or `THINGCAST_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Check that the backend is shared between processes
//! 4. Connect to Dragonfly and NATS
//! 5. Run the mutator on its own runtime until `Ctrl-C`
//! 6. Stop the mutator and flush the backends

mod error;

use thingcast_core::{BackendKind, Mutator, MutatorRuntime, ServiceConfig, ServiceContext, logging};
use tracing::info;

use crate::error::PublisherError;

/// Application entry point for the publisher.
///
/// # Errors
///
/// Returns an error if configuration, connection, or the mutator fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // 1. Load configuration.
    let config = ServiceConfig::load()?;

    // 2. Initialize structured logging.
    logging::init(&config.logging)?;
    info!(
        dragonfly_url = %config.backend.dragonfly_url,
        nats_url = %config.backend.nats_url,
        things = config.mutator.thing_ids.len(),
        "thingcast-publisher starting"
    );

    run(&config).await?;

    info!("thingcast-publisher stopped");
    Ok(())
}

async fn run(config: &ServiceConfig) -> Result<(), PublisherError> {
    // 3. An in-process backend would publish to nobody.
    if matches!(config.backend.kind, BackendKind::Memory) {
        return Err(PublisherError::InProcessBackend);
    }

    // 4. Connect to Dragonfly and NATS.
    let ctx = ServiceContext::connect(config).await?;
    info!("Connected to shared backends");

    // 5. Run the mutator on its own runtime.
    let runtime = MutatorRuntime::start(Mutator::new(ctx.clone(), &config.mutator))?;
    info!("Mutator running, press Ctrl-C to stop");
    let signal = tokio::signal::ctrl_c().await.map_err(PublisherError::Signal);

    // 6. Stop the mutator and flush the backends.
    tokio::task::spawn_blocking(move || runtime.stop())
        .await
        .map_err(|e| PublisherError::Join {
            message: e.to_string(),
        })??;
    ctx.shutdown().await?;
    signal
}
