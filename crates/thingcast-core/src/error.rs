//! Error types for the service context and the mutator.

use thingcast_db::StoreError;

use crate::config::ConfigError;

/// Errors that can occur while building or tearing down a context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A backend could not be reached or failed to shut down.
    #[error("backend error: {0}")]
    Backend(#[from] StoreError),
}

/// Errors raised by the mutator.
#[derive(Debug, thiserror::Error)]
pub enum MutatorError {
    /// Writing the snapshot or publishing it failed.
    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    /// The context tracks no ids, so there is nothing to mutate.
    #[error("no thing ids to mutate")]
    NoIds,

    /// The dedicated runtime or its thread could not be started.
    #[error("failed to start mutator runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The mutator thread panicked outside the supervised loops.
    #[error("mutator thread panicked")]
    ThreadPanicked,
}
