//! Process wiring for the `thingcast` binary.
//!
//! [`run`] connects the backends, optionally starts the embedded mutator on
//! its own runtime, serves HTTP until `Ctrl-C`, and then tears everything
//! down in reverse order.

use std::sync::Arc;

use thingcast_core::{ContextError, Mutator, MutatorError, MutatorRuntime, ServiceConfig, ServiceContext};
use tracing::{error, info};

use crate::server::{ServerError, start_server};
use crate::state::AppState;

/// Errors that can occur while running the server process.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The backends could not be connected or shut down.
    #[error("service context error: {0}")]
    Context(#[from] ContextError),

    /// The embedded mutator failed to start or exited with an error.
    #[error("mutator error: {0}")]
    Mutator(#[from] MutatorError),

    /// The server failed to bind or serve.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// Stopping the mutator thread could not be awaited.
    #[error("failed to stop mutator: {0}")]
    Join(String),
}

/// Resolve when the process receives `Ctrl-C`.
///
/// If the signal handler cannot be installed this never resolves and the
/// process runs until killed.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run the server process described by `config`.
///
/// # Errors
///
/// Returns the first fatal [`StartupError`]. Teardown still runs when
/// serving fails.
pub async fn run(config: &ServiceConfig) -> Result<(), StartupError> {
    // 1. Connect the snapshot store and broadcaster
    let ctx = ServiceContext::connect(config).await?;
    info!(
        backend = ?config.backend.kind,
        things = ctx.thing_ids().len(),
        "Service context ready"
    );

    // 2. Start the embedded mutator on its own runtime
    let mutator = if config.mutator.embedded {
        let runtime = MutatorRuntime::start(Mutator::new(ctx.clone(), &config.mutator))?;
        info!("Embedded mutator started");
        Some(runtime)
    } else {
        info!("Embedded mutator disabled, expecting an external publisher");
        None
    };

    // 3. Serve until Ctrl-C
    let state = Arc::new(AppState::new(ctx.clone()));
    let served = start_server(&config.server, state, shutdown_signal()).await;
    if let Err(e) = &served {
        error!(error = %e, "Server exited with error");
    }

    // 4. Stop the mutator (joining its thread blocks)
    if let Some(runtime) = mutator {
        tokio::task::spawn_blocking(move || runtime.stop())
            .await
            .map_err(|e| StartupError::Join(e.to_string()))??;
        info!("Embedded mutator stopped");
    }

    // 5. Flush and close the backends
    ctx.shutdown().await?;

    served?;
    Ok(())
}
