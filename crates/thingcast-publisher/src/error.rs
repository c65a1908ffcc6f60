//! Error types for the publisher binary.
//!
//! [`PublisherError`] wraps every failure mode of the publisher process so
//! `main` can propagate with `?`.

use thingcast_core::{ConfigError, ContextError, MutatorError};

/// Top-level error for the publisher binary.
#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The configured backend lives inside one process, so nothing this
    /// process publishes could reach a server.
    #[error("the publisher requires backend.kind = external")]
    InProcessBackend,

    /// Connecting to or closing the backends failed.
    #[error("backend error: {source}")]
    Context {
        /// The underlying context error.
        #[from]
        source: ContextError,
    },

    /// The mutator failed to start or exited with an error.
    #[error("mutator error: {source}")]
    Mutator {
        /// The underlying mutator error.
        #[from]
        source: MutatorError,
    },

    /// Waiting for `Ctrl-C` failed.
    #[error("signal error: {0}")]
    Signal(#[source] std::io::Error),

    /// The mutator thread could not be joined.
    #[error("failed to stop mutator: {message}")]
    Join {
        /// Description of the join failure.
        message: String,
    },
}
